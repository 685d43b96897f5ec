//! Root outputs and their translation into IR outputs
//!
//! An output that reads exactly one attribute of one mapped resource is
//! re-expressed as an attribute of that node. Everything else keeps its
//! resolved literal value. Sensitive outputs are never emitted.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde_json::Value;
use std::collections::BTreeMap;
use topograph_core::address::ResourceAddress;
use topograph_core::config::OutputsConfig;
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::ir::{IrOutput, ModelBuilder, ResolvedValue};
use topograph_core::node_id::generate_node_id;
use tracing::{debug, trace};

use crate::expressions::{references_of, resolve_targets, Reference};
use crate::index::PlanIndex;

/// Built-in plan attribute → IR attribute renames
pub const ATTRIBUTE_TRANSLATIONS: &[(&str, &str)] = &[
    ("public_ip", "public_address"),
    ("private_ip", "private_address"),
    ("id", "tosca_id"),
];

/// Translate a plan attribute name; configured renames take precedence
pub fn translate_attribute(attribute: &str, renames: &BTreeMap<String, String>) -> String {
    if let Some(renamed) = renames.get(attribute) {
        return renamed.clone();
    }
    ATTRIBUTE_TRANSLATIONS
        .iter()
        .find(|(from, _)| *from == attribute)
        .map_or_else(|| attribute.to_string(), |(_, to)| (*to).to_string())
}

/// A root output as declared and resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputDefinition {
    pub name: String,
    pub description: Option<String>,
    pub sensitive: bool,
    /// Resolved value, if known at plan time
    pub value: Option<Value>,
    /// Reference strings of the output expression
    pub references: Vec<String>,
}

/// Collects root outputs from the configuration, resolved values and output changes
pub struct OutputExtractor;

impl OutputExtractor {
    /// All root outputs, sorted by name
    pub fn extract(index: &PlanIndex<'_>) -> Vec<OutputDefinition> {
        let plan = index.plan();
        let mut outputs: BTreeMap<String, OutputDefinition> = BTreeMap::new();

        if let Some(root) = plan.root_config() {
            for (name, config) in &root.outputs {
                let def = outputs.entry(name.clone()).or_default();
                def.name = name.clone();
                def.description = config.description.clone();
                def.sensitive |= config.sensitive;
                def.references = config
                    .expression
                    .as_ref()
                    .map(references_of)
                    .unwrap_or_default();
            }
        }

        if let Some(values) = plan.resolved_values() {
            for (name, resolved) in &values.outputs {
                let def = outputs.entry(name.clone()).or_default();
                def.name = name.clone();
                def.sensitive |= resolved.sensitive;
                if def.value.is_none() {
                    def.value = resolved.value.clone();
                }
            }
        }

        for (name, change) in &plan.output_changes {
            let def = outputs.entry(name.clone()).or_default();
            def.name = name.clone();
            def.sensitive |= change.after_sensitive.as_ref().and_then(Value::as_bool) == Some(true);
            if def.value.is_none() {
                def.value = change.after.clone().filter(|v| !v.is_null());
            }
        }

        outputs.into_values().collect()
    }
}

/// Converts output definitions into IR outputs
pub struct OutputMapper<'a> {
    renames: &'a BTreeMap<String, String>,
}

impl<'a> OutputMapper<'a> {
    pub fn new(config: &'a OutputsConfig) -> Self {
        Self {
            renames: &config.attribute_renames,
        }
    }

    pub fn map(
        &self,
        outputs: &[OutputDefinition],
        index: &PlanIndex<'_>,
        builder: &dyn ModelBuilder,
        diagnostics: &mut Diagnostics,
    ) -> Vec<IrOutput> {
        let mut mapped = Vec::new();
        for output in outputs {
            if output.sensitive {
                debug!("Dropping sensitive output {}", output.name);
                continue;
            }
            let value = self
                .symbolic(output, index, builder, diagnostics)
                .unwrap_or_else(|| {
                    ResolvedValue::Literal(output.value.clone().unwrap_or(Value::Null))
                });
            mapped.push(IrOutput {
                name: output.name.clone(),
                description: output.description.clone(),
                value,
            });
        }
        mapped
    }

    fn symbolic(
        &self,
        output: &OutputDefinition,
        index: &PlanIndex<'_>,
        builder: &dyn ModelBuilder,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedValue> {
        let (address, attribute) = single_attribute(output, index)?;

        let instances: Vec<_> = index
            .instances_of(&address.config_address().to_string())
            .into_iter()
            .filter(|i| address.key.is_none() || i.parsed.key == address.key)
            .collect();
        let node_id = match instances.as_slice() {
            [instance] => generate_node_id(&instance.address, &instance.resource_type),
            _ => {
                trace!(
                    "Output {} reads {address} which has {} instances",
                    output.name,
                    instances.len()
                );
                return None;
            }
        };

        if !builder.has_node(&node_id) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ReferenceUnresolved,
                    format!(
                        "output {} reads {address}.{attribute}, which was not mapped",
                        output.name
                    ),
                )
                .at(address.to_string()),
            );
            return None;
        }

        Some(ResolvedValue::SymbolicAttribute {
            node_id,
            attribute: translate_attribute(&attribute, self.renames),
        })
    }
}

/// The `(resource, attribute)` pair an output reads, if it reads exactly one
/// and nothing else
fn single_attribute(
    output: &OutputDefinition,
    index: &PlanIndex<'_>,
) -> Option<(ResourceAddress, String)> {
    let mut pairs: Vec<(ResourceAddress, String)> = Vec::new();
    let mut bare: Vec<ResourceAddress> = Vec::new();

    for raw in &output.references {
        let targets = resolve_targets(index, &[], raw);
        if targets.is_empty() {
            if matches!(
                Reference::parse(raw, &[]),
                Some(Reference::Variable { .. } | Reference::Local(_))
            ) {
                return None;
            }
            continue;
        }
        for target in targets {
            match target.attribute {
                Some(attribute) => {
                    let pair = (target.address, attribute);
                    if !pairs.contains(&pair) {
                        pairs.push(pair);
                    }
                }
                None => bare.push(target.address),
            }
        }
    }

    let single = match pairs.as_slice() {
        [(address, _)] => bare.iter().all(|b| b == address),
        _ => false,
    };
    if single {
        pairs.pop()
    } else {
        None
    }
}
