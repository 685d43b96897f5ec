//! Cross-resource reference edges
//!
//! The primary source of edges is the configuration's expression tree. When
//! a resource has no expression detail (state-only documents, imported
//! resources), literal identifier values are matched against the id-like
//! attributes of every other resource instead. That fallback is lossy.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use strum_macros::Display;
use topograph_core::address::ResourceAddress;
use topograph_core::config::ReferencesConfig;
use topograph_core::relationships::{classify, RelationshipKind};
use tracing::{debug, trace};

use crate::expressions::{references_of, resolve_targets};
use crate::index::PlanIndex;
use crate::walker::PlanResource;

/// Where an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeOrigin {
    /// Declared in the configuration's expression tree
    Expression,
    /// Inferred by matching literal identifiers
    IdMatch,
    /// Injected by a named synthetic rule
    Synthetic,
}

/// A directed reference from one resource instance to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEdge {
    pub source_address: String,
    /// Top-level property that carried the reference
    pub property: String,
    pub target_address: String,
    pub target_type: String,
    pub relationship: RelationshipKind,
    pub origin: EdgeOrigin,
}

impl ReferenceEdge {
    /// Build an edge, classifying it with the relationship rule table
    pub fn new(
        source_address: impl Into<String>,
        property: impl Into<String>,
        target_address: impl Into<String>,
        target_type: impl Into<String>,
        origin: EdgeOrigin,
    ) -> Self {
        let property = property.into();
        let target_type = target_type.into();
        Self {
            relationship: classify(&property, &target_type),
            source_address: source_address.into(),
            property,
            target_address: target_address.into(),
            target_type,
            origin,
        }
    }
}

pub struct ReferenceGraphExtractor<'a> {
    index: &'a PlanIndex<'a>,
    config: &'a ReferencesConfig,
    /// Identifier value → addresses carrying it in an id attribute
    ids: HashMap<String, Vec<String>>,
}

impl<'a> ReferenceGraphExtractor<'a> {
    pub fn new(index: &'a PlanIndex<'a>, config: &'a ReferencesConfig) -> Self {
        let mut ids: HashMap<String, Vec<String>> = HashMap::new();
        for resource in index.resources().iter().chain(index.prior_resources()) {
            for attribute in &config.id_attributes {
                let Some(Value::String(id)) = resource.value(attribute) else {
                    continue;
                };
                if id.is_empty() {
                    continue;
                }
                let owners = ids.entry(id.clone()).or_default();
                if !owners.contains(&resource.address) {
                    owners.push(resource.address.clone());
                }
            }
        }
        Self { index, config, ids }
    }

    /// Edges leaving one resource instance
    pub fn extract(&self, address: &str) -> Vec<ReferenceEdge> {
        match self.index.resource(address) {
            Some(resource) => self.extract_resource(resource),
            None => Vec::new(),
        }
    }

    /// Every edge of the plan, in walk order
    pub fn graph(&self) -> Vec<ReferenceEdge> {
        self.index
            .resources()
            .iter()
            .flat_map(|r| self.extract_resource(r))
            .collect()
    }

    /// Whether any resource of `source_type` has an edge to `target_address`
    pub fn is_referenced_by_type(&self, target_address: &str, source_type: &str) -> bool {
        self.index
            .resources()
            .iter()
            .filter(|r| r.resource_type == source_type)
            .any(|r| {
                self.extract_resource(r)
                    .iter()
                    .any(|e| e.target_address == target_address)
            })
    }

    fn extract_resource(&self, resource: &PlanResource) -> Vec<ReferenceEdge> {
        let edges = self.from_expressions(resource);
        if !edges.is_empty() || !self.config.id_fallback {
            return edges;
        }
        let fallback = self.from_id_matching(resource);
        if !fallback.is_empty() {
            debug!(
                "{}: {} edges inferred by identifier matching",
                resource.address,
                fallback.len()
            );
        }
        fallback
    }

    fn from_expressions(&self, resource: &PlanResource) -> Vec<ReferenceEdge> {
        let Some(config) = self.index.resource_config(resource) else {
            return Vec::new();
        };
        let module = resource.module_names();
        let mut edges = Vec::new();

        let declared = config
            .expressions
            .iter()
            .map(|(property, expr)| (property.as_str(), references_of(expr)))
            .chain(std::iter::once(("depends_on", config.depends_on.clone())));

        for (property, refs) in declared {
            for raw in &refs {
                for target in resolve_targets(self.index, &module, raw) {
                    for instance in self.expand(resource, &target.address) {
                        trace!("{} -{property}-> {} via {raw}", resource.address, instance.address);
                        push_edge(
                            &mut edges,
                            ReferenceEdge::new(
                                &resource.address,
                                property,
                                &instance.address,
                                &instance.resource_type,
                                EdgeOrigin::Expression,
                            ),
                        );
                    }
                }
            }
        }
        edges
    }

    /// Expand a configuration-level target to the instances it denotes
    fn expand(&self, source: &PlanResource, target: &ResourceAddress) -> Vec<&'a PlanResource> {
        let mut candidates = self
            .index
            .instances_of(&target.config_address().to_string());

        let same_module = target
            .module_path
            .iter()
            .map(|m| &m.name)
            .eq(source.parsed.module_path.iter().map(|m| &m.name));
        if same_module {
            let scoped: Vec<_> = candidates
                .iter()
                .copied()
                .filter(|c| c.parsed.module_path == source.parsed.module_path)
                .collect();
            if !scoped.is_empty() {
                candidates = scoped;
            }
        }

        if let Some(key) = &target.key {
            candidates.retain(|c| c.parsed.key.as_ref() == Some(key));
            return candidates;
        }

        if candidates.len() > 1 {
            if let Some(key) = &source.parsed.key {
                let paired: Vec<_> = candidates
                    .iter()
                    .copied()
                    .filter(|c| c.parsed.key.as_ref() == Some(key))
                    .collect();
                if !paired.is_empty() {
                    return paired;
                }
            }
        }
        candidates
    }

    fn from_id_matching(&self, resource: &PlanResource) -> Vec<ReferenceEdge> {
        let Some(values) = resource.values.as_object() else {
            return Vec::new();
        };
        let mut edges = Vec::new();

        for (property, value) in values {
            if self.config.id_attributes.contains(property) {
                continue;
            }
            let literals: Vec<&str> = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for literal in literals {
                if !self.config.looks_like_id(literal) {
                    continue;
                }
                let Some(owners) = self.ids.get(literal) else {
                    continue;
                };
                for owner in owners {
                    let Some(target_type) = self.index.resource_type(owner) else {
                        continue;
                    };
                    trace!("{} -{property}-> {owner} via id {literal}", resource.address);
                    push_edge(
                        &mut edges,
                        ReferenceEdge::new(
                            &resource.address,
                            property,
                            owner,
                            target_type,
                            EdgeOrigin::IdMatch,
                        ),
                    );
                }
            }
        }
        edges
    }
}

/// Append an edge unless it is a self edge or a duplicate `(property, target)`
fn push_edge(edges: &mut Vec<ReferenceEdge>, edge: ReferenceEdge) {
    if edge.source_address == edge.target_address {
        return;
    }
    if edges
        .iter()
        .any(|e| e.property == edge.property && e.target_address == edge.target_address)
    {
        return;
    }
    edges.push(edge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use topograph_core::plan::Plan;

    fn targets(edges: &[ReferenceEdge]) -> Vec<(&str, &str)> {
        edges
            .iter()
            .map(|e| (e.property.as_str(), e.target_address.as_str()))
            .collect()
    }

    fn web_plan() -> Plan {
        Plan::from_value(json!({
            "planned_values": {"root_module": {"resources": [
                {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main", "values": {}},
                {"address": "aws_subnet.private[0]", "type": "aws_subnet", "name": "private", "values": {}},
                {"address": "aws_subnet.private[1]", "type": "aws_subnet", "name": "private", "values": {}},
                {"address": "aws_lb.front", "type": "aws_lb", "name": "front", "values": {}},
                {"address": "aws_instance.web[0]", "type": "aws_instance", "name": "web", "values": {}},
                {"address": "aws_instance.web[1]", "type": "aws_instance", "name": "web", "values": {}},
                {"address": "aws_security_group.web", "type": "aws_security_group", "name": "web", "values": {}}
            ]}},
            "configuration": {"root_module": {"resources": [
                {"address": "aws_subnet.private", "type": "aws_subnet", "name": "private",
                 "expressions": {"vpc_id": {"references": ["aws_vpc.main.id", "aws_vpc.main"]}}},
                {"address": "aws_instance.web", "type": "aws_instance", "name": "web",
                 "expressions": {
                    "subnet_id": {"references": ["aws_subnet.private", "count.index"]},
                    "vpc_security_group_ids": {"references": ["aws_security_group.web.id", "aws_security_group.web"]},
                    "user_data": {"references": ["aws_lb.front.dns_name", "aws_lb.front"]}
                 },
                 "depends_on": ["aws_vpc.main"]},
                {"address": "aws_security_group.web", "type": "aws_security_group", "name": "web",
                 "expressions": {
                    "vpc_id": {"references": ["aws_vpc.main.id"]},
                    "ingress": [{"security_groups": {"references": ["aws_security_group.web.id"]}}]
                 }}
            ]}}
        }))
        .unwrap()
    }

    #[test]
    fn test_expression_edges_are_classified() {
        let plan = web_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);

        let edges = extractor.extract("aws_instance.web[1]");
        assert_eq!(
            targets(&edges),
            vec![
                ("subnet_id", "aws_subnet.private[1]"),
                ("vpc_security_group_ids", "aws_security_group.web"),
                ("user_data", "aws_lb.front"),
                ("depends_on", "aws_vpc.main"),
            ]
        );
        assert_eq!(edges[0].relationship, RelationshipKind::DependsOn);
        assert_eq!(edges[1].relationship, RelationshipKind::DependsOn);
        assert_eq!(edges[2].relationship, RelationshipKind::ConnectsTo);
        assert_eq!(edges[3].relationship, RelationshipKind::DependsOn);
        assert!(edges.iter().all(|e| e.origin == EdgeOrigin::Expression));
    }

    #[test]
    fn test_unkeyed_source_expands_to_every_instance() {
        let plan = Plan::from_value(json!({
            "planned_values": {"root_module": {"resources": [
                {"address": "aws_subnet.a[0]", "type": "aws_subnet", "name": "a", "values": {}},
                {"address": "aws_subnet.a[1]", "type": "aws_subnet", "name": "a", "values": {}},
                {"address": "aws_lb.front", "type": "aws_lb", "name": "front", "values": {}}
            ]}},
            "configuration": {"root_module": {"resources": [
                {"address": "aws_lb.front", "type": "aws_lb", "name": "front",
                 "expressions": {"subnets": {"references": ["aws_subnet.a"]}}}
            ]}}
        }))
        .unwrap();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        assert_eq!(
            targets(&extractor.extract("aws_lb.front")),
            vec![("subnets", "aws_subnet.a[0]"), ("subnets", "aws_subnet.a[1]")]
        );
    }

    #[test]
    fn test_self_edges_and_duplicates_removed() {
        let plan = web_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        assert_eq!(
            targets(&extractor.extract("aws_security_group.web")),
            vec![("vpc_id", "aws_vpc.main")]
        );
        assert_eq!(
            targets(&extractor.extract("aws_subnet.private[0]")),
            vec![("vpc_id", "aws_vpc.main")]
        );
    }

    #[test]
    fn test_module_relative_references() {
        let plan = Plan::from_value(json!({
            "planned_values": {"root_module": {"child_modules": [
                {"address": "module.app[\"blue\"]", "resources": [
                    {"address": "module.app[\"blue\"].aws_security_group.this", "type": "aws_security_group", "name": "this", "values": {}},
                    {"address": "module.app[\"blue\"].aws_instance.this", "type": "aws_instance", "name": "this", "values": {}}
                ]},
                {"address": "module.app[\"green\"]", "resources": [
                    {"address": "module.app[\"green\"].aws_security_group.this", "type": "aws_security_group", "name": "this", "values": {}},
                    {"address": "module.app[\"green\"].aws_instance.this", "type": "aws_instance", "name": "this", "values": {}}
                ]}
            ]}},
            "configuration": {"root_module": {"module_calls": {"app": {"module": {"resources": [
                {"address": "aws_security_group.this", "type": "aws_security_group", "name": "this"},
                {"address": "aws_instance.this", "type": "aws_instance", "name": "this",
                 "expressions": {"vpc_security_group_ids": {"references": ["aws_security_group.this.id", "aws_security_group.this"]}}}
            ]}}}}}
        }))
        .unwrap();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        assert_eq!(
            targets(&extractor.extract("module.app[\"green\"].aws_instance.this")),
            vec![(
                "vpc_security_group_ids",
                "module.app[\"green\"].aws_security_group.this"
            )]
        );
    }

    fn state_only_plan() -> Plan {
        Plan::from_value(json!({
            "values": {"root_module": {"resources": [
                {"address": "aws_subnet.a", "type": "aws_subnet", "name": "a",
                 "values": {"id": "subnet-111", "vpc_id": "vpc-999"}},
                {"address": "aws_instance.web", "type": "aws_instance", "name": "web",
                 "values": {"id": "i-1", "subnet_id": "subnet-111", "vpc_security_group_ids": ["sg-5"], "ami": "ami-1"}}
            ]}},
            "prior_state": {"values": {"root_module": {"resources": [
                {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main", "values": {"id": "vpc-999"}},
                {"address": "aws_security_group.web", "type": "aws_security_group", "name": "web", "values": {"id": "sg-5"}}
            ]}}}
        }))
        .unwrap()
    }

    #[test]
    fn test_id_matching_fallback() {
        let plan = state_only_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);

        let edges = extractor.extract("aws_instance.web");
        assert_eq!(
            targets(&edges),
            vec![
                ("subnet_id", "aws_subnet.a"),
                ("vpc_security_group_ids", "aws_security_group.web"),
            ]
        );
        assert!(edges.iter().all(|e| e.origin == EdgeOrigin::IdMatch));
        assert_eq!(edges[1].target_type, "aws_security_group");

        assert_eq!(
            targets(&extractor.extract("aws_subnet.a")),
            vec![("vpc_id", "aws_vpc.main")]
        );
    }

    #[test]
    fn test_id_matching_can_be_disabled() {
        let plan = state_only_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig {
            id_fallback: false,
            ..ReferencesConfig::default()
        };
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        assert!(extractor.extract("aws_instance.web").is_empty());
    }

    #[test]
    fn test_is_referenced_by_type() {
        let plan = web_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        assert!(extractor.is_referenced_by_type("aws_subnet.private[0]", "aws_instance"));
        assert!(!extractor.is_referenced_by_type("aws_subnet.private[0]", "aws_lb"));
    }
}
