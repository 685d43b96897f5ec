//! Reference-level understanding of configuration expressions
//!
//! Expressions are never evaluated. Each expression object lists the
//! traversals it reads (`"references": ["aws_vpc.main.id", "aws_vpc.main"]`);
//! this module parses those strings and chases them across module
//! boundaries (through module outputs and module call arguments).

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde_json::Value;
use topograph_core::address::{split_segments, InstanceKey, ModuleStep, ResourceAddress};
use tracing::trace;

use crate::index::PlanIndex;

/// Upper bound on module hops when chasing a reference
const MAX_CHASE_DEPTH: usize = 16;

/// Symbols that are never resource references
const META_ROOTS: &[&str] = &["count", "each", "path", "self", "terraform"];

/// A parsed reference string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A resource (or data source); module path is absolute
    Resource {
        address: ResourceAddress,
        attribute: Option<String>,
    },
    /// `module.<name>.<output>` seen from `module`
    ModuleOutput { module: Vec<String>, output: String },
    /// `var.<name>` declared in `module`
    Variable {
        module: Vec<String>,
        name: String,
        key: Option<InstanceKey>,
    },
    Local(String),
    /// `count.index`, `each.value`, `path.module`, ...
    Meta(String),
}

impl Reference {
    /// Parse a reference string written inside `module`.
    ///
    /// Returns `None` for traversals that cannot be interpreted (bare
    /// `module.x`, dynamic keys such as `[count.index]`).
    pub fn parse(raw: &str, module: &[String]) -> Option<Self> {
        let segments = match split_segments(raw) {
            Ok(segments) => segments,
            Err(e) => {
                trace!("Skipping uninterpretable reference {raw}: {e}");
                return None;
            }
        };
        let root = segments.first()?;

        match root.name.as_str() {
            "var" => {
                let var = segments.get(1)?;
                Some(Reference::Variable {
                    module: module.to_vec(),
                    name: var.name.clone(),
                    key: var.key.clone(),
                })
            }
            "local" => segments.get(1).map(|s| Reference::Local(s.name.clone())),
            "module" => {
                let child = segments.get(1)?;
                let output = segments.get(2)?;
                let mut path = module.to_vec();
                path.push(child.name.clone());
                Some(Reference::ModuleOutput {
                    module: path,
                    output: output.name.clone(),
                })
            }
            name if META_ROOTS.contains(&name) => Some(Reference::Meta(raw.to_string())),
            _ => {
                let (mut address, rest) = ResourceAddress::parse_prefix(raw).ok()?;
                address.module_path = module
                    .iter()
                    .map(|name| ModuleStep {
                        name: name.clone(),
                        key: None,
                    })
                    .collect();
                Some(Reference::Resource {
                    address,
                    attribute: rest.first().map(|s| s.name.clone()),
                })
            }
        }
    }
}

/// Every reference string in an expression tree, deduplicated, in order.
///
/// Nested blocks are arrays/objects of expressions; they are scanned
/// recursively.
pub fn references_of(expr: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_references(expr, &mut refs);
    let mut seen = std::collections::HashSet::new();
    refs.retain(|r| seen.insert(r.clone()));
    refs
}

fn collect_references(expr: &Value, refs: &mut Vec<String>) {
    match expr {
        Value::Object(map) => {
            if let Some(Value::Array(list)) = map.get("references") {
                refs.extend(list.iter().filter_map(|r| r.as_str().map(str::to_string)));
            }
            for (key, value) in map {
                if key != "references" {
                    collect_references(value, refs);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, refs);
            }
        }
        _ => {}
    }
}

/// Whether an expression is an explicit literal with no references
pub fn is_constant(expr: &Value) -> bool {
    expr.get("constant_value").is_some() && references_of(expr).is_empty()
}

/// A resource-level target of a reference, with the attribute read from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Configuration-level address, keyed only if the reference was keyed
    pub address: ResourceAddress,
    pub attribute: Option<String>,
}

/// Resolve a reference written in `module` to the resources it reads,
/// chasing module outputs and module call arguments.
pub fn resolve_targets(index: &PlanIndex<'_>, module: &[String], raw: &str) -> Vec<Target> {
    resolve_targets_at(index, module, raw, 0)
}

fn resolve_targets_at(
    index: &PlanIndex<'_>,
    module: &[String],
    raw: &str,
    depth: usize,
) -> Vec<Target> {
    if depth > MAX_CHASE_DEPTH {
        trace!("Giving up on {raw}: module chase too deep");
        return Vec::new();
    }

    match Reference::parse(raw, module) {
        Some(Reference::Resource { address, attribute }) => vec![Target { address, attribute }],
        Some(Reference::ModuleOutput { module: child, output }) => {
            let Some(expr) = index
                .module_config(&child)
                .and_then(|m| m.output(&output))
                .and_then(|o| o.expression.as_ref())
            else {
                trace!("Module output {raw} has no expression");
                return Vec::new();
            };
            references_of(expr)
                .iter()
                .flat_map(|r| resolve_targets_at(index, &child, r, depth + 1))
                .collect()
        }
        Some(Reference::Variable { module: declared_in, name, .. }) if !declared_in.is_empty() => {
            module_argument_refs(index, &declared_in, &name)
                .iter()
                .flat_map(|r| resolve_targets_at(index, parent_of(&declared_in), r, depth + 1))
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Resolve a reference written in `module` to the root variables it reads,
/// chasing module call arguments upwards.
pub fn resolve_root_variables(
    index: &PlanIndex<'_>,
    module: &[String],
    raw: &str,
) -> Vec<(String, Option<InstanceKey>)> {
    resolve_root_variables_at(index, module, raw, 0)
}

fn resolve_root_variables_at(
    index: &PlanIndex<'_>,
    module: &[String],
    raw: &str,
    depth: usize,
) -> Vec<(String, Option<InstanceKey>)> {
    if depth > MAX_CHASE_DEPTH {
        return Vec::new();
    }
    match Reference::parse(raw, module) {
        Some(Reference::Variable { module: declared_in, name, key }) => {
            if declared_in.is_empty() {
                return vec![(name, key)];
            }
            module_argument_refs(index, &declared_in, &name)
                .iter()
                .flat_map(|r| {
                    resolve_root_variables_at(index, parent_of(&declared_in), r, depth + 1)
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// References in the argument a module call passes for one of its variables
fn module_argument_refs(index: &PlanIndex<'_>, module: &[String], variable: &str) -> Vec<String> {
    index
        .module_call(module)
        .and_then(|call| call.expressions.get(variable))
        .map(references_of)
        .unwrap_or_default()
}

fn parent_of(module: &[String]) -> &[String] {
    &module[..module.len().saturating_sub(1)]
}
