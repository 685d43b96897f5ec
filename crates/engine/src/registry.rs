//! Resource mapper trait and the type-keyed registry

use serde_json::Value;
use std::collections::BTreeMap;
use strum_macros::Display;
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::error::Result;

use crate::context::MappingContext;
use crate::filter::DependencyFilterSpec;
use crate::mappers;
use crate::walker::PlanResource;

/// Dispatch phase of a mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MapperRole {
    /// Produces a node
    Primary,
    /// Links nodes produced by primary mappers
    Associative,
}

/// Maps resources of one type into IR
pub trait ResourceMapper: Send + Sync {
    /// The resource type this mapper handles
    fn resource_type(&self) -> &str;

    fn role(&self) -> MapperRole {
        MapperRole::Primary
    }

    /// Whether this mapper accepts a specific payload
    fn can_map(&self, resource_type: &str, values: &Value) -> bool {
        let _ = values;
        resource_type == self.resource_type()
    }

    /// Edge filter applied to this mapper's requirements
    fn dependency_filter(&self) -> &DependencyFilterSpec {
        &DependencyFilterSpec::NONE
    }

    /// Map one resource.
    ///
    /// # Errors
    ///
    /// An error is recorded against this resource only; the run continues.
    fn map(&self, ctx: &mut MappingContext<'_>, resource: &PlanResource) -> Result<()>;
}

/// Resource type → mapper, exactly one per type
#[derive(Default)]
pub struct MapperRegistry {
    mappers: BTreeMap<String, Box<dyn ResourceMapper>>,
    diagnostics: Diagnostics,
}

impl MapperRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the bundled mappers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        mappers::register_defaults(&mut registry);
        registry
    }

    /// Register a mapper. Re-registering a type replaces the earlier mapper
    /// and records a diagnostic.
    pub fn register(&mut self, mapper: Box<dyn ResourceMapper>) {
        let resource_type = mapper.resource_type().to_string();
        if self.mappers.insert(resource_type.clone(), mapper).is_some() {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::RegistryOverwrite,
                    format!("mapper for {resource_type} replaced"),
                )
                .of_type(resource_type),
            );
        }
    }

    pub fn get(&self, resource_type: &str) -> Option<&dyn ResourceMapper> {
        self.mappers.get(resource_type).map(|m| m.as_ref())
    }

    pub fn role_of(&self, resource_type: &str) -> Option<MapperRole> {
        self.get(resource_type).map(|m| m.role())
    }

    /// Registered resource types, sorted
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Diagnostics recorded while registering
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str, MapperRole);

    impl ResourceMapper for Noop {
        fn resource_type(&self) -> &str {
            self.0
        }

        fn role(&self) -> MapperRole {
            self.1
        }

        fn map(&self, _ctx: &mut MappingContext<'_>, _resource: &PlanResource) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = MapperRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(Noop("aws_vpc", MapperRole::Primary)));
        registry.register(Box::new(Noop("aws_route_table_association", MapperRole::Associative)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.role_of("aws_vpc"), Some(MapperRole::Primary));
        assert_eq!(
            registry.role_of("aws_route_table_association"),
            Some(MapperRole::Associative)
        );
        assert!(registry.get("aws_instance").is_none());
        assert!(registry.diagnostics().is_empty());
    }

    #[test]
    fn test_reregistration_overwrites_with_diagnostic() {
        let mut registry = MapperRegistry::new();
        registry.register(Box::new(Noop("aws_vpc", MapperRole::Primary)));
        registry.register(Box::new(Noop("aws_vpc", MapperRole::Associative)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.role_of("aws_vpc"), Some(MapperRole::Associative));
        assert_eq!(
            registry.diagnostics().count(DiagnosticKind::RegistryOverwrite),
            1
        );
    }

    #[test]
    fn test_default_can_map_checks_type() {
        let mapper = Noop("aws_vpc", MapperRole::Primary);
        assert!(mapper.can_map("aws_vpc", &Value::Null));
        assert!(!mapper.can_map("aws_subnet", &Value::Null));
    }

    #[test]
    fn test_defaults_are_registered() {
        let registry = MapperRegistry::with_defaults();
        let types: Vec<&str> = registry.types().collect();
        assert!(types.contains(&"aws_instance"));
        assert!(types.contains(&"aws_route_table_association"));
        assert!(registry.diagnostics().is_empty());
    }
}
