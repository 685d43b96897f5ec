//! Relationship classification rules
//!
//! Reference edges carry no semantics of their own; this module maps an
//! edge's property name and target resource type onto an IR relationship
//! kind. Classification is a fixed, ordered rule table: the first rule that
//! matches wins. It is a heuristic, not a semantic classifier, and false
//! positives are tolerated.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// IR relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RelationshipKind {
    DependsOn,
    ConnectsTo,
    HostedOn,
    LinksTo,
}

/// Coarse category of a resource type, used as a rule target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TypeCategory {
    Network,
    LoadBalancer,
    Compute,
}

/// Ordered substring table for type categories. Load balancers come first so
/// `aws_lb_target_group` is not mistaken for anything else.
const TYPE_CATEGORY_RULES: &[(TypeCategory, &[&str])] = &[
    (
        TypeCategory::LoadBalancer,
        &["_lb", "_elb", "_alb", "load_balancer", "target_group", "lb_listener"],
    ),
    (
        TypeCategory::Network,
        &[
            "_vpc",
            "subnet",
            "security_group",
            "network",
            "route_table",
            "internet_gateway",
            "nat_gateway",
            "firewall",
        ],
    ),
    (
        TypeCategory::Compute,
        &["aws_instance", "compute_instance", "virtual_machine", "_vm"],
    ),
];

/// Categorize a resource type, if it belongs to a known category
pub fn type_category(resource_type: &str) -> Option<TypeCategory> {
    let lower = resource_type.to_ascii_lowercase();
    TYPE_CATEGORY_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(category, _)| *category)
}

/// Property-name condition of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyPattern {
    /// Any property
    Any,
    /// Identifier-like property: `*_id`, `*_ids`, or an explicit `depends_on`
    IdentifierSuffix,
}

impl PropertyPattern {
    pub fn matches(&self, property: &str) -> bool {
        match self {
            PropertyPattern::Any => true,
            PropertyPattern::IdentifierSuffix => {
                property.ends_with("_id") || property.ends_with("_ids") || property == "depends_on"
            }
        }
    }
}

/// One row of the classification table
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    /// Name of this rule (for logging/debugging)
    pub name: &'static str,
    pub property: PropertyPattern,
    pub target: TypeCategory,
    pub kind: RelationshipKind,
}

impl ClassificationRule {
    pub const fn new(
        name: &'static str,
        property: PropertyPattern,
        target: TypeCategory,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            property,
            target,
            kind,
        }
    }

    pub fn matches(&self, property: &str, target_type: &str) -> bool {
        self.property.matches(property) && type_category(target_type) == Some(self.target)
    }
}

/// Relationship kind used when no rule matches
pub const DEFAULT_RELATIONSHIP: RelationshipKind = RelationshipKind::DependsOn;

/// The classification table, in priority order
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule::new(
        "network_identifier",
        PropertyPattern::IdentifierSuffix,
        TypeCategory::Network,
        RelationshipKind::DependsOn,
    ),
    ClassificationRule::new(
        "load_balancer_target",
        PropertyPattern::Any,
        TypeCategory::LoadBalancer,
        RelationshipKind::ConnectsTo,
    ),
    ClassificationRule::new(
        "compute_host",
        PropertyPattern::Any,
        TypeCategory::Compute,
        RelationshipKind::HostedOn,
    ),
];

/// Classify an edge by property name and target resource type
pub fn classify(property: &str, target_type: &str) -> RelationshipKind {
    classify_with(CLASSIFICATION_RULES, property, target_type)
}

/// Classify an edge against an explicit rule table
pub fn classify_with(
    rules: &[ClassificationRule],
    property: &str,
    target_type: &str,
) -> RelationshipKind {
    rules
        .iter()
        .find(|rule| rule.matches(property, target_type))
        .map(|rule| rule.kind)
        .unwrap_or(DEFAULT_RELATIONSHIP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_id_depends_on() {
        assert_eq!(classify("subnet_id", "aws_subnet"), RelationshipKind::DependsOn);
        assert_eq!(
            classify("vpc_security_group_ids", "aws_security_group"),
            RelationshipKind::DependsOn
        );
    }

    #[test]
    fn test_load_balancer_connects_to() {
        assert_eq!(
            classify("target_group_arn", "aws_lb_target_group"),
            RelationshipKind::ConnectsTo
        );
        assert_eq!(
            classify("load_balancer_arn", "aws_lb"),
            RelationshipKind::ConnectsTo
        );
    }

    #[test]
    fn test_compute_hosted_on() {
        assert_eq!(classify("instance", "aws_instance"), RelationshipKind::HostedOn);
        assert_eq!(classify("instance_id", "aws_instance"), RelationshipKind::HostedOn);
    }

    #[test]
    fn test_unmatched_defaults_to_depends_on() {
        assert_eq!(classify("bucket", "aws_s3_bucket"), DEFAULT_RELATIONSHIP);
        assert_eq!(classify("anything", "aws_db_instance"), DEFAULT_RELATIONSHIP);
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = [
            ClassificationRule::new(
                "first",
                PropertyPattern::Any,
                TypeCategory::Network,
                RelationshipKind::LinksTo,
            ),
            ClassificationRule::new(
                "second",
                PropertyPattern::IdentifierSuffix,
                TypeCategory::Network,
                RelationshipKind::ConnectsTo,
            ),
        ];
        assert_eq!(
            classify_with(&rules, "vpc_id", "aws_vpc"),
            RelationshipKind::LinksTo
        );
    }

    #[test]
    fn test_type_categories() {
        assert_eq!(type_category("aws_lb_target_group"), Some(TypeCategory::LoadBalancer));
        assert_eq!(type_category("aws_vpc"), Some(TypeCategory::Network));
        assert_eq!(type_category("aws_route_table"), Some(TypeCategory::Network));
        assert_eq!(type_category("aws_instance"), Some(TypeCategory::Compute));
        assert_eq!(type_category("aws_s3_bucket"), None);
    }

    #[test]
    fn test_relationship_kind_strings() {
        assert_eq!(RelationshipKind::DependsOn.to_string(), "depends-on");
        assert_eq!(
            "connects-to".parse::<RelationshipKind>().ok(),
            Some(RelationshipKind::ConnectsTo)
        );
    }
}
