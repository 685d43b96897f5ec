//! Per-mapper edge filtering and synthetic dependency injection

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use strum_macros::Display;
use topograph_core::relationships::RelationshipKind;
use tracing::debug;

use crate::categories::{network_tier, subnet_zone, zone_hint, NetworkTier};
use crate::index::PlanIndex;
use crate::references::{EdgeOrigin, ReferenceEdge, ReferenceGraphExtractor};
use crate::walker::PlanResource;

const SUBNET_TYPE: &str = "aws_subnet";
const ROUTE_TABLE_TYPE: &str = "aws_route_table";
const ROUTE_TABLE_ASSOCIATION_TYPE: &str = "aws_route_table_association";

/// Named rules that add edges the plan does not state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SyntheticRule {
    /// A private subnet routes through a private route table. A route table
    /// pinned to the subnet's zone is preferred; only when none matches is
    /// the first private route table by address used. Skipped when an
    /// association resource already links the subnet.
    PrivateSubnetRouteTable,
}

impl SyntheticRule {
    pub fn edges(
        &self,
        source: &PlanResource,
        index: &PlanIndex<'_>,
        extractor: &ReferenceGraphExtractor<'_>,
    ) -> Vec<ReferenceEdge> {
        match self {
            SyntheticRule::PrivateSubnetRouteTable => {
                private_route_table(source, index, extractor).into_iter().collect()
            }
        }
    }
}

fn private_route_table(
    source: &PlanResource,
    index: &PlanIndex<'_>,
    extractor: &ReferenceGraphExtractor<'_>,
) -> Option<ReferenceEdge> {
    if source.resource_type != SUBNET_TYPE || network_tier(source) != Some(NetworkTier::Private) {
        return None;
    }
    if extractor.is_referenced_by_type(&source.address, ROUTE_TABLE_ASSOCIATION_TYPE) {
        debug!("{} has an explicit route table association", source.address);
        return None;
    }

    let mut tables: Vec<&PlanResource> = index
        .resources()
        .iter()
        .filter(|r| r.resource_type == ROUTE_TABLE_TYPE && !r.is_data())
        .filter(|r| network_tier(r) == Some(NetworkTier::Private))
        .collect();
    tables.sort_by(|a, b| a.address.cmp(&b.address));

    let zone = subnet_zone(source);
    let chosen = tables
        .iter()
        .find(|t| zone.is_some() && zone_hint(t) == zone)
        .or_else(|| tables.first())?;

    let mut edge = ReferenceEdge::new(
        &source.address,
        "route_table",
        &chosen.address,
        &chosen.resource_type,
        EdgeOrigin::Synthetic,
    );
    edge.relationship = RelationshipKind::LinksTo;
    Some(edge)
}

/// What a mapper keeps from a resource's extracted edges
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyFilterSpec {
    pub exclude_target_types: &'static [&'static str],
    pub exclude_properties: &'static [&'static str],
    pub synthetic_edges: &'static [SyntheticRule],
}

impl DependencyFilterSpec {
    /// Keep every edge, add nothing
    pub const NONE: Self = Self {
        exclude_target_types: &[],
        exclude_properties: &[],
        synthetic_edges: &[],
    };

    pub fn retains(&self, edge: &ReferenceEdge) -> bool {
        !self.exclude_target_types.contains(&edge.target_type.as_str())
            && !self.exclude_properties.contains(&edge.property.as_str())
    }

    /// Filter extracted edges, then add synthetic ones that neither
    /// duplicate an extracted target nor fall under an exclusion
    pub fn apply(
        &self,
        source: &PlanResource,
        edges: Vec<ReferenceEdge>,
        index: &PlanIndex<'_>,
        extractor: &ReferenceGraphExtractor<'_>,
    ) -> Vec<ReferenceEdge> {
        let targets: Vec<String> = edges.iter().map(|e| e.target_address.clone()).collect();
        let mut kept: Vec<ReferenceEdge> = edges.into_iter().filter(|e| self.retains(e)).collect();

        for rule in self.synthetic_edges {
            for edge in rule.edges(source, index, extractor) {
                if targets.contains(&edge.target_address) || !self.retains(&edge) {
                    continue;
                }
                debug!(
                    "{rule}: {} -> {}",
                    edge.source_address, edge.target_address
                );
                kept.push(edge);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use topograph_core::config::ReferencesConfig;
    use topograph_core::plan::Plan;

    const ROUTE_TABLE_RULE: DependencyFilterSpec = DependencyFilterSpec {
        exclude_target_types: &[],
        exclude_properties: &[],
        synthetic_edges: &[SyntheticRule::PrivateSubnetRouteTable],
    };

    fn network_plan(resources: Value, configured: Value) -> Plan {
        Plan::from_value(json!({
            "planned_values": {"root_module": {"resources": resources}},
            "configuration": {"root_module": {"resources": configured}}
        }))
        .unwrap()
    }

    fn res(address: &str, values: Value) -> Value {
        let (kind, name) = address.split_once('.').unwrap();
        let name = name.split('[').next().unwrap();
        json!({"address": address, "type": kind, "name": name, "values": values})
    }

    fn synthetic_targets(plan: &Plan, subnet: &str) -> Vec<String> {
        let index = PlanIndex::build(plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        let source = index.resource(subnet).unwrap();
        let edges = extractor.extract(subnet);
        ROUTE_TABLE_RULE
            .apply(source, edges, &index, &extractor)
            .into_iter()
            .filter(|e| e.origin == EdgeOrigin::Synthetic)
            .map(|e| e.target_address)
            .collect()
    }

    #[test]
    fn test_exclusions() {
        let spec = DependencyFilterSpec {
            exclude_target_types: &["aws_security_group"],
            exclude_properties: &["route"],
            synthetic_edges: &[],
        };
        let edge = |property: &str, target_type: &str| {
            ReferenceEdge::new("a.b", property, "x.y", target_type, EdgeOrigin::Expression)
        };
        assert!(!spec.retains(&edge("ingress", "aws_security_group")));
        assert!(!spec.retains(&edge("route", "aws_internet_gateway")));
        assert!(spec.retains(&edge("vpc_id", "aws_vpc")));
        assert!(DependencyFilterSpec::NONE.retains(&edge("route", "aws_security_group")));
    }

    #[test]
    fn test_zone_specific_route_table_preferred() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private", json!({})),
                res("aws_route_table.private_b", json!({})),
                res("aws_route_table.private_a", json!({})),
                res("aws_subnet.private_b", json!({"availability_zone": "us-east-1b"}))
            ]),
            json!([]),
        );
        assert_eq!(
            synthetic_targets(&plan, "aws_subnet.private_b"),
            vec!["aws_route_table.private_b"]
        );
    }

    #[test]
    fn test_generic_fallback_is_first_by_address() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private_z", json!({})),
                res("aws_route_table.private_shared", json!({})),
                res("aws_route_table.private_main", json!({})),
                res("aws_route_table.public", json!({})),
                res("aws_subnet.private_c", json!({"availability_zone": "us-east-1c"}))
            ]),
            json!([]),
        );
        assert_eq!(
            synthetic_targets(&plan, "aws_subnet.private_c"),
            vec!["aws_route_table.private_main"]
        );
    }

    #[test]
    fn test_unmatched_zone_falls_back_to_pinned_table() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private_b", json!({})),
                res("aws_route_table.private_a", json!({})),
                res("aws_subnet.private_c", json!({"availability_zone": "us-east-1c"}))
            ]),
            json!([]),
        );
        assert_eq!(
            synthetic_targets(&plan, "aws_subnet.private_c"),
            vec!["aws_route_table.private_a"]
        );
    }

    #[test]
    fn test_public_subnet_gets_nothing() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private", json!({})),
                res("aws_subnet.web", json!({"map_public_ip_on_launch": true}))
            ]),
            json!([]),
        );
        assert!(synthetic_targets(&plan, "aws_subnet.web").is_empty());
    }

    #[test]
    fn test_explicit_association_suppresses_rule() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private", json!({})),
                res("aws_subnet.private", json!({})),
                res("aws_route_table_association.private", json!({}))
            ]),
            json!([
                {"address": "aws_route_table_association.private", "type": "aws_route_table_association", "name": "private",
                 "expressions": {
                    "subnet_id": {"references": ["aws_subnet.private.id", "aws_subnet.private"]},
                    "route_table_id": {"references": ["aws_route_table.private.id", "aws_route_table.private"]}
                 }}
            ]),
        );
        assert!(synthetic_targets(&plan, "aws_subnet.private").is_empty());
    }

    #[test]
    fn test_synthetic_never_duplicates_extracted_edge() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private", json!({})),
                res("aws_subnet.private", json!({}))
            ]),
            json!([
                {"address": "aws_subnet.private", "type": "aws_subnet", "name": "private",
                 "expressions": {"tags": {"references": ["aws_route_table.private.id"]}}}
            ]),
        );
        assert!(synthetic_targets(&plan, "aws_subnet.private").is_empty());
    }

    #[test]
    fn test_synthetic_edge_shape() {
        let plan = network_plan(
            json!([
                res("aws_route_table.private", json!({})),
                res("aws_subnet.private", json!({}))
            ]),
            json!([]),
        );
        let index = PlanIndex::build(&plan).unwrap();
        let config = ReferencesConfig::default();
        let extractor = ReferenceGraphExtractor::new(&index, &config);
        let source = index.resource("aws_subnet.private").unwrap();
        let edges = SyntheticRule::PrivateSubnetRouteTable.edges(source, &index, &extractor);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].property, "route_table");
        assert_eq!(edges[0].relationship, RelationshipKind::LinksTo);
        assert_eq!(edges[0].origin, EdgeOrigin::Synthetic);
    }
}
