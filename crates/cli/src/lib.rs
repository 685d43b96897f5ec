//! Library interface for the topograph CLI
//!
//! Command bodies live here so integration tests can drive them without
//! spawning the binary; main.rs only parses arguments and sets up logging.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{bail, Context, Result};
use std::path::Path;
use topograph_core::config::Config;
use topograph_core::diagnostics::Diagnostics;
use topograph_core::plan::Plan;
use topograph_engine::{
    map_plan, MappingOutcome, PlanIndex, ReferenceEdge, ReferenceGraphExtractor, VariableBinding,
    VariableBindingTracker,
};

/// Read and parse a plan document
pub fn load_plan(path: &Path) -> Result<Plan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    Plan::from_json(&content).with_context(|| format!("Failed to parse plan {}", path.display()))
}

/// Load configuration (defaults, file, environment) and validate it
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Map a plan and render the topology as pretty JSON
pub fn convert(plan: &Plan, config: &Config) -> Result<(String, MappingOutcome)> {
    let (topology, outcome) = map_plan(plan, config)?;
    let json = serde_json::to_string_pretty(&topology).context("Failed to serialize topology")?;
    Ok((json, outcome))
}

/// Fail when any resource failed to map
pub fn check_strict(outcome: &MappingOutcome) -> Result<()> {
    if outcome.has_failures() {
        bail!(
            "{} resource(s) failed to map: {}",
            outcome.failed_resources.len(),
            outcome.failed_resources.join(", ")
        );
    }
    Ok(())
}

/// Every classified reference edge of a plan
pub fn references(plan: &Plan, config: &Config) -> Result<Vec<ReferenceEdge>> {
    let index = PlanIndex::build(plan)?;
    let extractor = ReferenceGraphExtractor::new(&index, &config.references);
    Ok(extractor.graph())
}

/// Every variable binding of a plan, ordered by address then property
pub fn bindings(plan: &Plan) -> Result<(Vec<VariableBinding>, Diagnostics)> {
    let index = PlanIndex::build(plan)?;
    let mut diagnostics = Diagnostics::new();
    let tracker = VariableBindingTracker::build(&index, &mut diagnostics);
    Ok((tracker.bindings().cloned().collect(), diagnostics))
}

pub fn format_edge(edge: &ReferenceEdge) -> String {
    format!(
        "{} -{}-> {} [{}, {}]",
        edge.source_address, edge.property, edge.target_address, edge.relationship, edge.origin
    )
}

pub fn format_binding(binding: &VariableBinding) -> String {
    let key = binding
        .key
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    format!(
        "{}.{} = var.{}{} ({})",
        binding.resource_address, binding.property, binding.variable, key, binding.tier
    )
}
