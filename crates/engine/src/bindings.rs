//! Tracking which concrete values came from input variables
//!
//! Three tiers, tried in order:
//!
//! 1. **Scalar**: the property's expression reads a root variable (directly
//!    or through module call arguments) and the value is not composite.
//! 2. **Map-keyed**: the value equals exactly one entry of a map variable.
//! 3. **List-indexed**: the resource is instance `n` and entry `n` of a list
//!    variable equals the value.
//!
//! A directly referenced collection variable whose whole value differs from
//! the property value is matched by tiers 2/3 against that variable alone,
//! so bindings are always recorded at the narrowest granularity observed.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use strum_macros::Display;
use topograph_core::address::InstanceKey;
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::ir::{CollectionKey, ResolvedValue};
use tracing::{debug, trace};

use crate::expressions::{is_constant, references_of, resolve_root_variables, resolve_targets};
use crate::index::PlanIndex;
use crate::walker::PlanResource;

/// Declared type of a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Number,
    Bool,
    List(Box<TypeTag>),
    Map(Box<TypeTag>),
    Any,
}

impl TypeTag {
    /// Parse a type constraint (`list(string)`, `map(number)`, ...).
    ///
    /// `set(T)` and `tuple(...)` read as lists, `object(...)` as `map(any)`.
    /// Anything unrecognized is `Any`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let inner = |prefix: &str| {
            raw.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(')'))
                .map(TypeTag::parse)
        };
        match raw {
            "string" => TypeTag::String,
            "number" => TypeTag::Number,
            "bool" => TypeTag::Bool,
            "list" | "set" | "tuple" => TypeTag::List(Box::new(TypeTag::Any)),
            "map" | "object" => TypeTag::Map(Box::new(TypeTag::Any)),
            _ if raw.starts_with("object(") => TypeTag::Map(Box::new(TypeTag::Any)),
            _ if raw.starts_with("tuple(") => TypeTag::List(Box::new(TypeTag::Any)),
            _ => {
                if let Some(t) = inner("list(").or_else(|| inner("set(")) {
                    TypeTag::List(Box::new(t))
                } else if let Some(t) = inner("map(") {
                    TypeTag::Map(Box::new(t))
                } else {
                    TypeTag::Any
                }
            }
        }
    }

    /// Infer a type from a value
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::String(_) => TypeTag::String,
            Value::Number(_) => TypeTag::Number,
            Value::Bool(_) => TypeTag::Bool,
            Value::Array(items) => {
                TypeTag::List(Box::new(items.first().map_or(TypeTag::Any, TypeTag::infer)))
            }
            Value::Object(entries) => TypeTag::Map(Box::new(
                entries.values().next().map_or(TypeTag::Any, TypeTag::infer),
            )),
            Value::Null => TypeTag::Any,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, TypeTag::List(_) | TypeTag::Map(_))
    }
}

/// A root variable declaration joined with its effective value
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub type_tag: TypeTag,
    pub default: Option<Value>,
    /// Value supplied for this run, else the default
    pub value: Option<Value>,
    pub sensitive: bool,
    pub description: Option<String>,
}

/// Root variable definitions in declaration order
pub fn variable_definitions(index: &PlanIndex<'_>) -> Vec<VariableDefinition> {
    index
        .root_variables()
        .iter()
        .map(|(name, config)| {
            let value = index.variable_value(name).cloned();
            let declared = config
                .type_tag
                .as_deref()
                .map_or(TypeTag::Any, TypeTag::parse);
            let type_tag = match declared {
                TypeTag::Any => config
                    .default
                    .as_ref()
                    .or(value.as_ref())
                    .map_or(TypeTag::Any, TypeTag::infer),
                declared => declared,
            };
            VariableDefinition {
                name: name.clone(),
                type_tag,
                default: config.default.clone(),
                value,
                sensitive: config.sensitive,
                description: config.description.clone(),
            }
        })
        .collect()
}

/// Which tier produced a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BindingTier {
    Scalar,
    MapKeyed,
    ListIndexed,
}

/// `(resource, property)` is supplied by `variable[key]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableBinding {
    pub resource_address: String,
    pub property: String,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<CollectionKey>,
    pub tier: BindingTier,
}

impl VariableBinding {
    pub fn to_value(&self) -> ResolvedValue {
        ResolvedValue::SymbolicInput {
            variable: self.variable.clone(),
            key: self.key.clone(),
        }
    }
}

/// Candidate collection entry for a value
struct EntryMatch {
    variable: String,
    key: CollectionKey,
    tier: BindingTier,
}

#[derive(Debug, Default)]
pub struct VariableBindingTracker {
    variables: Vec<VariableDefinition>,
    bindings: BTreeMap<(String, String), VariableBinding>,
}

impl VariableBindingTracker {
    /// Compute every binding of the plan's top-level resource properties.
    ///
    /// Ambiguous collection matches are recorded in `diagnostics`.
    pub fn build(index: &PlanIndex<'_>, diagnostics: &mut Diagnostics) -> Self {
        let mut tracker = Self {
            variables: variable_definitions(index),
            bindings: BTreeMap::new(),
        };

        let mut found = Vec::new();
        for resource in index.resources() {
            let Some(values) = resource.values.as_object() else {
                continue;
            };
            let config = index.resource_config(resource);
            for (property, value) in values {
                let expr = config.and_then(|c| c.expressions.get(property));
                if let Some(binding) =
                    tracker.bind(index, resource, property, value, expr, diagnostics)
                {
                    trace!(
                        "{}.{} bound to var.{} ({})",
                        resource.address,
                        property,
                        binding.variable,
                        binding.tier
                    );
                    found.push(binding);
                }
            }
        }

        for binding in found {
            tracker.bindings.insert(
                (binding.resource_address.clone(), binding.property.clone()),
                binding,
            );
        }
        debug!(
            "Tracked {} variable bindings over {} variables",
            tracker.bindings.len(),
            tracker.variables.len()
        );
        tracker
    }

    pub fn binding(&self, address: &str, property: &str) -> Option<&VariableBinding> {
        self.bindings
            .get(&(address.to_string(), property.to_string()))
    }

    /// All bindings, ordered by resource address then property
    pub fn bindings(&self) -> impl Iterator<Item = &VariableBinding> {
        self.bindings.values()
    }

    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.name == name)
    }

    fn bind(
        &self,
        index: &PlanIndex<'_>,
        resource: &PlanResource,
        property: &str,
        value: &Value,
        expr: Option<&Value>,
        diagnostics: &mut Diagnostics,
    ) -> Option<VariableBinding> {
        if let Some(expr) = expr {
            let module = resource.module_names();
            let refs = references_of(expr);
            let variables: Vec<_> = refs
                .iter()
                .flat_map(|r| resolve_root_variables(index, &module, r))
                .collect();
            if !variables.is_empty() {
                return self.bind_direct(resource, property, value, &variables, diagnostics);
            }
            if is_constant(expr) {
                return None;
            }
            if refs
                .iter()
                .any(|r| !resolve_targets(index, &module, r).is_empty())
            {
                return None;
            }
        }

        let matchable = match value {
            Value::String(s) => !s.is_empty(),
            Value::Number(_) => true,
            _ => false,
        };
        if !matchable {
            return None;
        }
        self.match_entries(resource, property, value, self.variables.iter(), diagnostics)
    }

    /// Tier 1, falling through to tiers 2/3 for collection variables
    fn bind_direct(
        &self,
        resource: &PlanResource,
        property: &str,
        value: &Value,
        variables: &[(String, Option<InstanceKey>)],
        diagnostics: &mut Diagnostics,
    ) -> Option<VariableBinding> {
        for (name, key) in variables {
            let Some(def) = self.variable(name) else {
                continue;
            };

            if let Some(key) = key {
                let entry = def.value.as_ref().and_then(|v| match key {
                    InstanceKey::Index(i) => v.get(*i),
                    InstanceKey::Key(k) => v.get(k.as_str()),
                });
                if entry.is_some_and(|e| e != value) {
                    continue;
                }
                let (key, tier) = match key {
                    InstanceKey::Index(i) => (CollectionKey::Index(*i), BindingTier::ListIndexed),
                    InstanceKey::Key(k) => (CollectionKey::Key(k.clone()), BindingTier::MapKeyed),
                };
                return Some(binding(resource, property, &def.name, Some(key), tier));
            }

            match &def.value {
                Some(known) if known != value => {
                    if def.type_tag.is_collection() {
                        if let Some(found) = self.match_entries(
                            resource,
                            property,
                            value,
                            std::iter::once(def),
                            diagnostics,
                        ) {
                            return Some(found);
                        }
                    }
                }
                _ => {
                    return Some(binding(
                        resource,
                        property,
                        &def.name,
                        None,
                        BindingTier::Scalar,
                    ))
                }
            }
        }
        None
    }

    /// Tiers 2 and 3 over the given variables. Map entries win over list
    /// entries; within a tier the first declared entry wins.
    fn match_entries<'v>(
        &self,
        resource: &PlanResource,
        property: &str,
        value: &Value,
        variables: impl Iterator<Item = &'v VariableDefinition>,
        diagnostics: &mut Diagnostics,
    ) -> Option<VariableBinding> {
        let mut map_matches = Vec::new();
        let mut list_matches = Vec::new();

        for def in variables {
            match (&def.type_tag, &def.value) {
                (TypeTag::Map(_), Some(Value::Object(entries))) => {
                    for (key, entry) in entries {
                        if entry == value {
                            map_matches.push(EntryMatch {
                                variable: def.name.clone(),
                                key: CollectionKey::Key(key.clone()),
                                tier: BindingTier::MapKeyed,
                            });
                        }
                    }
                }
                (TypeTag::List(_), Some(Value::Array(items))) => {
                    let Some(n) = resource.parsed.index() else {
                        continue;
                    };
                    if items.get(n) == Some(value) {
                        list_matches.push(EntryMatch {
                            variable: def.name.clone(),
                            key: CollectionKey::Index(n),
                            tier: BindingTier::ListIndexed,
                        });
                    }
                }
                _ => {}
            }
        }

        let matches = if map_matches.is_empty() {
            list_matches
        } else {
            map_matches
        };
        let first = matches.first()?;
        if matches.len() > 1 {
            let others: Vec<String> = matches[1..]
                .iter()
                .map(|m| format!("{}{}", m.variable, m.key))
                .collect();
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::BindingAmbiguous,
                    format!(
                        "{property} matches {}{} and {}; using the first",
                        first.variable,
                        first.key,
                        others.join(", ")
                    ),
                )
                .at(&resource.address)
                .of_type(&resource.resource_type),
            );
        }
        Some(binding(
            resource,
            property,
            &first.variable,
            Some(first.key.clone()),
            first.tier,
        ))
    }
}

fn binding(
    resource: &PlanResource,
    property: &str,
    variable: &str,
    key: Option<CollectionKey>,
    tier: BindingTier,
) -> VariableBinding {
    VariableBinding {
        resource_address: resource.address.clone(),
        property: property.to_string(),
        variable: variable.to_string(),
        key,
        tier,
    }
}
