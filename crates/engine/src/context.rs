//! Explicit context handed to every mapper call

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use im::OrdMap;
use serde_json::Value;
use topograph_core::config::Config;
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::ir::{ModelBuilder, Requirement, ResolvedValue};
use topograph_core::node_id::generate_node_id;

use crate::bindings::VariableBindingTracker;
use crate::filter::DependencyFilterSpec;
use crate::index::PlanIndex;
use crate::references::ReferenceGraphExtractor;
use crate::resolver::{PropertyResolver, ResolutionContext};
use crate::walker::PlanResource;

/// Everything a mapper may read, plus the builder it writes to
pub struct MappingContext<'a> {
    pub index: &'a PlanIndex<'a>,
    pub references: &'a ReferenceGraphExtractor<'a>,
    pub bindings: &'a VariableBindingTracker,
    pub resolver: PropertyResolver<'a>,
    pub config: &'a Config,
    pub builder: &'a mut dyn ModelBuilder,
    pub diagnostics: &'a mut Diagnostics,
}

impl MappingContext<'_> {
    pub fn node_id(&self, resource: &PlanResource) -> String {
        generate_node_id(&resource.address, &resource.resource_type)
    }

    /// A parameterizable property (symbolic when bound to a variable)
    pub fn property(&self, resource: &PlanResource, name: &str) -> ResolvedValue {
        self.resolver
            .resolve(&resource.address, name, ResolutionContext::Property)
    }

    /// A metadata value (always concrete)
    pub fn metadata(&self, resource: &PlanResource, name: &str) -> Value {
        self.resolver.concrete(&resource.address, name)
    }

    /// Metadata every node carries: address, type, change action, provider
    pub fn base_metadata(&self, resource: &PlanResource) -> OrdMap<String, Value> {
        let mut metadata = OrdMap::new();
        metadata.insert("address".to_string(), Value::from(resource.address.clone()));
        metadata.insert(
            "resource_type".to_string(),
            Value::from(resource.resource_type.clone()),
        );
        metadata.insert(
            "change_action".to_string(),
            resource
                .change_action
                .map_or(Value::Null, |a| Value::from(a.to_string())),
        );
        metadata.insert(
            "provider".to_string(),
            resource.provider.clone().map_or(Value::Null, Value::from),
        );
        metadata
    }

    /// Requirements of a resource: its extracted edges, filtered and
    /// augmented by `filter`, as node-level requirements. Edges to data
    /// sources that are never mapped are reported as `ReferenceUnresolved`.
    pub fn requirements(
        &mut self,
        resource: &PlanResource,
        filter: &DependencyFilterSpec,
    ) -> Vec<Requirement> {
        let edges = filter.apply(
            resource,
            self.references.extract(&resource.address),
            self.index,
            self.references,
        );

        let mut requirements: Vec<Requirement> = Vec::new();
        for edge in edges {
            if self.config.mapping.skip_data_sources
                && self
                    .index
                    .resource(&edge.target_address)
                    .is_some_and(PlanResource::is_data)
            {
                self.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::ReferenceUnresolved,
                        format!(
                            "{} reads data source {}, which is never mapped",
                            edge.property, edge.target_address
                        ),
                    )
                    .at(&resource.address)
                    .of_type(&resource.resource_type),
                );
                continue;
            }
            let requirement = Requirement {
                name: edge.property,
                target: generate_node_id(&edge.target_address, &edge.target_type),
                relationship: edge.relationship,
            };
            if !requirements.contains(&requirement) {
                requirements.push(requirement);
            }
        }
        requirements
    }

    /// Node id of the resource an associative resource's `property` points
    /// at. Records `MissingEndpoint` and returns `None` when the reference is
    /// absent or its node was never produced.
    pub fn endpoint(
        &mut self,
        resource: &PlanResource,
        property: &str,
        target_type: &str,
    ) -> Option<String> {
        let edge = self
            .references
            .extract(&resource.address)
            .into_iter()
            .find(|e| e.property == property && e.target_type == target_type);

        let Some(edge) = edge else {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::MissingEndpoint,
                    format!("{property} does not reference any {target_type}"),
                )
                .at(&resource.address)
                .of_type(&resource.resource_type),
            );
            return None;
        };

        let node_id = generate_node_id(&edge.target_address, &edge.target_type);
        if !self.builder.has_node(&node_id) {
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::MissingEndpoint,
                    format!("{property} target {} was not mapped", edge.target_address),
                )
                .at(&resource.address)
                .of_type(&resource.resource_type),
            );
            return None;
        }
        Some(node_id)
    }
}
