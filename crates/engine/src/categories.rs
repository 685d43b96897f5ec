//! Naming heuristics for network placement
//!
//! Plans rarely state whether a subnet or route table is public or private;
//! the convention is carried by names and tags. The signals live in an
//! ordered rule table and the first matching rule wins.

use serde_json::Value;
use strum_macros::Display;
use topograph_core::address::InstanceKey;

use crate::walker::PlanResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum NetworkTier {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy)]
enum TierSignal {
    /// A boolean attribute set to true
    AttributeTrue(&'static str),
    /// A naming token found in the name, instance key or `Name` tag
    NameContains(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct TierRule {
    name: &'static str,
    signal: TierSignal,
    tier: NetworkTier,
}

const TIER_RULES: &[TierRule] = &[
    TierRule {
        name: "public_ip_on_launch",
        signal: TierSignal::AttributeTrue("map_public_ip_on_launch"),
        tier: NetworkTier::Public,
    },
    TierRule {
        name: "named_public",
        signal: TierSignal::NameContains("public"),
        tier: NetworkTier::Public,
    },
    TierRule {
        name: "named_private",
        signal: TierSignal::NameContains("private"),
        tier: NetworkTier::Private,
    },
    TierRule {
        name: "named_isolated",
        signal: TierSignal::NameContains("isolated"),
        tier: NetworkTier::Private,
    },
    TierRule {
        name: "named_internal",
        signal: TierSignal::NameContains("internal"),
        tier: NetworkTier::Private,
    },
];

/// Lowercased naming signals of a resource: name, string key, `Name` tag
fn names(resource: &PlanResource) -> Vec<String> {
    let mut names = vec![resource.name.to_ascii_lowercase()];
    if let Some(InstanceKey::Key(key)) = &resource.parsed.key {
        names.push(key.to_ascii_lowercase());
    }
    if let Some(Value::String(tag)) = resource.value("tags").and_then(|t| t.get("Name")) {
        names.push(tag.to_ascii_lowercase());
    }
    names
}

/// Classify a subnet or route table as public or private
pub fn network_tier(resource: &PlanResource) -> Option<NetworkTier> {
    let names = names(resource);
    TIER_RULES
        .iter()
        .find(|rule| match rule.signal {
            TierSignal::AttributeTrue(attribute) => {
                resource.value(attribute).and_then(Value::as_bool) == Some(true)
            }
            TierSignal::NameContains(token) => names.iter().any(|n| n.contains(token)),
        })
        .map(|rule| {
            tracing::trace!("{} classified {} by {}", resource.address, rule.tier, rule.name);
            rule.tier
        })
}

/// Zone letter of an availability zone name: `us-east-1a` → `a`
pub fn zone_suffix(availability_zone: &str) -> Option<char> {
    let mut chars = availability_zone.chars().rev();
    let letter = chars.next()?;
    let digit = chars.next()?;
    (letter.is_ascii_lowercase() && digit.is_ascii_digit()).then_some(letter)
}

/// Zone letter a resource's naming pins it to, if any.
///
/// Recognizes a full zone name (`["us-east-1a"]`) or a trailing one-letter
/// token (`private_a`, `rt-private-b`).
pub fn zone_hint(resource: &PlanResource) -> Option<char> {
    names(resource).iter().find_map(|name| {
        if let Some(letter) = zone_suffix(name) {
            return Some(letter);
        }
        let (_, token) = name.rsplit_once(['_', '-'])?;
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_lowercase() => Some(letter),
            _ => None,
        }
    })
}

/// Zone letter a subnet is placed in: its availability zone, else its naming
pub fn subnet_zone(resource: &PlanResource) -> Option<char> {
    resource
        .value("availability_zone")
        .and_then(Value::as_str)
        .and_then(zone_suffix)
        .or_else(|| zone_hint(resource))
}
