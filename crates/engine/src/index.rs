//! Read-only indexes over the three views of a plan
//!
//! Built once per run. Joins the resolved-values tree, the prior-state tree
//! and the configuration tree by address so the extractors never have to
//! re-walk the document.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde_json::Value;
use std::collections::HashMap;
use topograph_core::diagnostics::Diagnostics;
use topograph_core::error::Result;
use topograph_core::plan::{ModuleCall, ModuleConfig, Plan, ResourceConfig, VariableConfig};
use tracing::debug;

use crate::walker::{PlanResource, PlanWalker};

/// Render a configuration-level module path as an address prefix
pub fn config_module_prefix(path: &[String]) -> String {
    path.iter().map(|m| format!("module.{m}.")).collect()
}

pub struct PlanIndex<'a> {
    plan: &'a Plan,
    resources: Vec<PlanResource>,
    prior: Vec<PlanResource>,
    by_address: HashMap<String, usize>,
    prior_by_address: HashMap<String, usize>,
    /// Config address → indices into `resources`, in walk order
    instances: HashMap<String, Vec<usize>>,
    configs: HashMap<String, &'a ResourceConfig>,
    modules: HashMap<Vec<String>, &'a ModuleConfig>,
    /// Module path → the call that instantiates it
    calls: HashMap<Vec<String>, &'a ModuleCall>,
    root_missing: bool,
    walk_diagnostics: Diagnostics,
}

impl<'a> PlanIndex<'a> {
    /// Walk the plan and build all indexes.
    ///
    /// # Errors
    ///
    /// Fails only when the resolved-values tree contains a malformed
    /// address. A missing root module is recorded, not returned.
    pub fn build(plan: &'a Plan) -> Result<Self> {
        let walker = PlanWalker::new(plan);
        let walk = walker.walk()?;
        let prior = walker.walk_prior_state()?;

        let by_address = walk
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.address.clone(), i))
            .collect();
        let prior_by_address = prior
            .iter()
            .enumerate()
            .map(|(i, r)| (r.address.clone(), i))
            .collect();

        let mut instances: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, resource) in walk.resources.iter().enumerate() {
            instances.entry(resource.config_address()).or_default().push(i);
        }

        let mut index = Self {
            plan,
            resources: walk.resources,
            prior,
            by_address,
            prior_by_address,
            instances,
            configs: HashMap::new(),
            modules: HashMap::new(),
            calls: HashMap::new(),
            root_missing: walk.root_missing,
            walk_diagnostics: walk.diagnostics,
        };
        if let Some(root) = plan.root_config() {
            index.index_module(root, Vec::new());
        }

        debug!(
            "Indexed {} resources, {} prior-state resources, {} configured resources",
            index.resources.len(),
            index.prior.len(),
            index.configs.len()
        );
        Ok(index)
    }

    fn index_module(&mut self, module: &'a ModuleConfig, path: Vec<String>) {
        let prefix = config_module_prefix(&path);
        for resource in &module.resources {
            self.configs
                .insert(format!("{prefix}{}", resource.address), resource);
        }
        for (name, call) in &module.module_calls {
            let mut child = path.clone();
            child.push(name.clone());
            self.calls.insert(child.clone(), call);
            if let Some(child_module) = call.module.as_deref() {
                self.index_module(child_module, child);
            }
        }
        self.modules.insert(path, module);
    }

    pub fn plan(&self) -> &'a Plan {
        self.plan
    }

    /// Walked resources, in plan order
    pub fn resources(&self) -> &[PlanResource] {
        &self.resources
    }

    pub fn prior_resources(&self) -> &[PlanResource] {
        &self.prior
    }

    pub fn root_missing(&self) -> bool {
        self.root_missing
    }

    /// Diagnostics recorded while walking
    pub fn walk_diagnostics(&self) -> &Diagnostics {
        &self.walk_diagnostics
    }

    pub fn resource(&self, address: &str) -> Option<&PlanResource> {
        self.by_address.get(address).map(|&i| &self.resources[i])
    }

    pub fn prior_resource(&self, address: &str) -> Option<&PlanResource> {
        self.prior_by_address.get(address).map(|&i| &self.prior[i])
    }

    /// Resource type of an address, looking in both resolved and prior trees
    pub fn resource_type(&self, address: &str) -> Option<&str> {
        self.resource(address)
            .or_else(|| self.prior_resource(address))
            .map(|r| r.resource_type.as_str())
    }

    /// All instances of a configuration-level address
    pub fn instances_of(&self, config_address: &str) -> Vec<&PlanResource> {
        self.instances
            .get(config_address)
            .map(|ids| ids.iter().map(|&i| &self.resources[i]).collect())
            .unwrap_or_default()
    }

    /// Configuration block of a resource instance
    pub fn resource_config(&self, resource: &PlanResource) -> Option<&'a ResourceConfig> {
        self.configs.get(&resource.config_address()).copied()
    }

    pub fn module_config(&self, path: &[String]) -> Option<&'a ModuleConfig> {
        self.modules.get(path).copied()
    }

    /// The module block that instantiates the module at `path`
    pub fn module_call(&self, path: &[String]) -> Option<&'a ModuleCall> {
        self.calls.get(path).copied()
    }

    /// Root variable declarations, in declaration order
    pub fn root_variables(&self) -> &'a [(String, VariableConfig)] {
        self.plan
            .root_config()
            .map(|m| m.variables.as_slice())
            .unwrap_or_default()
    }

    /// Effective value of a root variable: the run's value, else the default
    pub fn variable_value(&self, name: &str) -> Option<&'a Value> {
        self.plan
            .variables
            .get(name)
            .and_then(|v| v.value.as_ref())
            .or_else(|| {
                self.plan
                    .root_config()
                    .and_then(|m| m.variable(name))
                    .and_then(|v| v.default.as_ref())
            })
    }

    /// Concrete value of one attribute: resolved tree first, prior state second
    pub fn concrete_value(&self, address: &str, property: &str) -> Option<&Value> {
        self.resource(address)
            .and_then(|r| r.value(property))
            .or_else(|| self.prior_resource(address).and_then(|r| r.value(property)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_plan() -> Plan {
        Plan::from_value(json!({
            "variables": {"region": {"value": "eu-west-1"}},
            "planned_values": {"root_module": {
                "resources": [
                    {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main",
                     "values": {"cidr_block": "10.0.0.0/16", "id": null}}
                ],
                "child_modules": [{
                    "address": "module.net",
                    "resources": [
                        {"address": "module.net.aws_subnet.this[0]", "type": "aws_subnet", "name": "this", "values": {}},
                        {"address": "module.net.aws_subnet.this[1]", "type": "aws_subnet", "name": "this", "values": {}}
                    ]
                }]
            }},
            "prior_state": {"values": {"root_module": {"resources": [
                {"address": "aws_vpc.main", "type": "aws_vpc", "name": "main", "values": {"id": "vpc-123"}}
            ]}}},
            "configuration": {"root_module": {
                "variables": {"region": {"default": "us-east-1"}, "zone": {"default": "a"}},
                "resources": [{"address": "aws_vpc.main", "type": "aws_vpc", "name": "main", "expressions": {}}],
                "module_calls": {"net": {
                    "source": "./net",
                    "expressions": {"vpc_id": {"references": ["aws_vpc.main.id", "aws_vpc.main"]}},
                    "module": {"resources": [
                        {"address": "aws_subnet.this", "type": "aws_subnet", "name": "this", "expressions": {}}
                    ]}
                }}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_instances_grouped_by_config_address() {
        let plan = sample_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let subnets = index.instances_of("module.net.aws_subnet.this");
        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets[1].address, "module.net.aws_subnet.this[1]");
        assert!(index.instances_of("aws_subnet.this").is_empty());
    }

    #[test]
    fn test_module_configs_are_prefixed() {
        let plan = sample_plan();
        let index = PlanIndex::build(&plan).unwrap();
        let subnet = index.resource("module.net.aws_subnet.this[0]").unwrap();
        let config = index.resource_config(subnet).unwrap();
        assert_eq!(config.address, "aws_subnet.this");
        assert!(index.module_call(&["net".to_string()]).is_some());
        assert!(index.module_config(&["net".to_string()]).is_some());
        assert!(index.module_config(&[]).is_some());
    }

    #[test]
    fn test_variable_value_prefers_run_value() {
        let plan = sample_plan();
        let index = PlanIndex::build(&plan).unwrap();
        assert_eq!(index.variable_value("region"), Some(&json!("eu-west-1")));
        assert_eq!(index.variable_value("zone"), Some(&json!("a")));
        assert_eq!(index.variable_value("missing"), None);
    }

    #[test]
    fn test_concrete_value_falls_back_to_prior_state() {
        let plan = sample_plan();
        let index = PlanIndex::build(&plan).unwrap();
        assert_eq!(
            index.concrete_value("aws_vpc.main", "cidr_block"),
            Some(&json!("10.0.0.0/16"))
        );
        assert_eq!(index.concrete_value("aws_vpc.main", "id"), Some(&json!("vpc-123")));
        assert_eq!(index.concrete_value("aws_vpc.main", "arn"), None);
    }
}
