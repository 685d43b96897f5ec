//! Enumeration of plan resources across nested module instances

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde_json::Value;
use std::collections::HashMap;
use topograph_core::address::{ResourceAddress, ResourceMode};
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::error::{Error, Result};
use topograph_core::plan::{ChangeAction, Plan, ResourceChange, StateModule};
use tracing::trace;

/// One resource instance with its concrete values
#[derive(Debug, Clone)]
pub struct PlanResource {
    /// Address string as it appears in the plan
    pub address: String,
    pub parsed: ResourceAddress,
    pub resource_type: String,
    pub name: String,
    pub mode: ResourceMode,
    /// Concrete attribute values (`null` if the plan has none)
    pub values: Value,
    pub change_action: Option<ChangeAction>,
    pub provider: Option<String>,
}

impl PlanResource {
    /// Top-level attribute value, if present and not null
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values.get(property).filter(|v| !v.is_null())
    }

    /// Module names from the root, ignoring instance keys
    pub fn module_names(&self) -> Vec<String> {
        self.parsed.module_path.iter().map(|m| m.name.clone()).collect()
    }

    /// Configuration-level address (no instance keys)
    pub fn config_address(&self) -> String {
        self.parsed.config_address().to_string()
    }

    pub fn is_data(&self) -> bool {
        self.mode == ResourceMode::Data
    }
}

/// Result of walking one resolved-values tree
#[derive(Debug, Default)]
pub struct Walk {
    /// Resources in depth-first plan order
    pub resources: Vec<PlanResource>,
    /// True when the tree had no root module container at all
    pub root_missing: bool,
    pub diagnostics: Diagnostics,
}

/// Recursively enumerates resources of a plan
pub struct PlanWalker<'a> {
    plan: &'a Plan,
    changes: HashMap<&'a str, &'a ResourceChange>,
}

impl<'a> PlanWalker<'a> {
    pub fn new(plan: &'a Plan) -> Self {
        let changes = plan
            .resource_changes
            .iter()
            .map(|c| (c.address.as_str(), c))
            .collect();
        Self { plan, changes }
    }

    /// Walk the resolved-values tree.
    ///
    /// A missing root module yields an empty walk flagged `root_missing`
    /// plus a diagnostic; whether that is fatal is the caller's decision.
    ///
    /// # Errors
    ///
    /// Fails if a resource address in the tree cannot be parsed.
    pub fn walk(&self) -> Result<Walk> {
        let Some(root) = self.plan.resolved_root() else {
            let mut walk = Walk {
                root_missing: true,
                ..Walk::default()
            };
            walk.diagnostics.push(Diagnostic::new(
                DiagnosticKind::RootModuleMissing,
                "plan has no resolved-values root module",
            ));
            return Ok(walk);
        };

        let mut resources = Vec::new();
        self.collect(root, &mut resources)?;
        Ok(Walk {
            resources,
            ..Walk::default()
        })
    }

    /// Walk the prior-state tree, if the plan has one
    pub fn walk_prior_state(&self) -> Result<Vec<PlanResource>> {
        let mut resources = Vec::new();
        if let Some(root) = self.plan.prior_root() {
            self.collect(root, &mut resources)?;
        }
        Ok(resources)
    }

    fn collect(&self, module: &StateModule, out: &mut Vec<PlanResource>) -> Result<()> {
        for resource in &module.resources {
            let parsed = ResourceAddress::parse(&resource.address).map_err(|e| {
                Error::extraction(format!("malformed resource address in plan: {e}"))
            })?;
            let change = self.changes.get(resource.address.as_str());
            trace!("walked {}", resource.address);
            out.push(PlanResource {
                address: resource.address.clone(),
                name: if resource.name.is_empty() {
                    parsed.name.clone()
                } else {
                    resource.name.clone()
                },
                parsed,
                resource_type: resource.resource_type.clone(),
                mode: resource.mode,
                values: resource.values.clone(),
                change_action: change.map(|c| c.change.action()),
                provider: resource
                    .provider_name
                    .clone()
                    .or_else(|| change.and_then(|c| c.provider_name.clone())),
            });
        }
        for child in &module.child_modules {
            self.collect(child, out)?;
        }
        Ok(())
    }
}
