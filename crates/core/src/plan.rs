//! Plan document model
//!
//! Typed view of the machine-readable plan (`terraform show -json`). The
//! document carries three independently structured views of the same
//! infrastructure: the configuration (expression trees and declarations),
//! the resolved values (planned values, or `values` for a state document)
//! and an optional prior state. Everything here is read-only input.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use strum_macros::{Display, EnumString};

use crate::address::ResourceMode;
use crate::error::Result;

/// Complete plan document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Plan {
    pub format_version: Option<String>,
    pub terraform_version: Option<String>,

    /// Values supplied for root variables in this run
    #[serde(default)]
    pub variables: BTreeMap<String, PlanVariable>,

    /// Resolved values for a plan document
    pub planned_values: Option<StateValues>,

    /// Resolved values for a state document
    pub values: Option<StateValues>,

    #[serde(default)]
    pub resource_changes: Vec<ResourceChange>,

    #[serde(default)]
    pub output_changes: BTreeMap<String, Change>,

    pub prior_state: Option<State>,

    pub configuration: Option<Configuration>,
}

impl Plan {
    /// Parse a plan document from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a plan document from an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// The resolved-values section (planned values first, state values second)
    pub fn resolved_values(&self) -> Option<&StateValues> {
        self.planned_values.as_ref().or(self.values.as_ref())
    }

    /// Root module of the resolved-values tree, if present
    pub fn resolved_root(&self) -> Option<&StateModule> {
        self.resolved_values()
            .and_then(|values| values.root_module.as_ref())
    }

    /// Root module of the prior-state tree, if present
    pub fn prior_root(&self) -> Option<&StateModule> {
        self.prior_state
            .as_ref()
            .and_then(|state| state.values.as_ref())
            .and_then(|values| values.root_module.as_ref())
    }

    /// Root module of the configuration tree, if present
    pub fn root_config(&self) -> Option<&ModuleConfig> {
        self.configuration.as_ref().map(|c| &c.root_module)
    }
}

/// Value supplied for a root variable
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanVariable {
    pub value: Option<Value>,
}

/// Prior state wrapper
#[derive(Debug, Clone, Default, Deserialize)]
pub struct State {
    pub values: Option<StateValues>,
}

/// A resolved-values tree
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateValues {
    pub root_module: Option<StateModule>,
    #[serde(default)]
    pub outputs: BTreeMap<String, StateOutput>,
}

/// Resolved output value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateOutput {
    #[serde(default)]
    pub sensitive: bool,
    pub value: Option<Value>,
}

/// A module instance in a resolved-values tree
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateModule {
    /// Module instance address (absent for the root module)
    pub address: Option<String>,
    #[serde(default)]
    pub resources: Vec<StateResource>,
    #[serde(default)]
    pub child_modules: Vec<StateModule>,
}

/// A resource instance with concrete attribute values
#[derive(Debug, Clone, Deserialize)]
pub struct StateResource {
    pub address: String,
    #[serde(default)]
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    pub provider_name: Option<String>,
    #[serde(default)]
    pub values: Value,
}

/// Planned change for one resource instance
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    #[serde(default)]
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider_name: Option<String>,
    pub change: Change,
}

/// Before/after pair of a resource or output change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub actions: Vec<String>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    #[serde(default)]
    pub after_unknown: Option<Value>,
    #[serde(default)]
    pub after_sensitive: Option<Value>,
}

impl Change {
    /// Collapse the action list into a single change action
    pub fn action(&self) -> ChangeAction {
        ChangeAction::from_actions(&self.actions)
    }
}

/// Planned action for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeAction {
    NoOp,
    Create,
    Read,
    Update,
    Delete,
    Replace,
}

impl ChangeAction {
    /// Interpret the plan's action list (`["delete", "create"]` is a replace)
    pub fn from_actions(actions: &[String]) -> Self {
        let has = |a: &str| actions.iter().any(|x| x == a);
        if has("delete") && has("create") {
            ChangeAction::Replace
        } else if has("create") {
            ChangeAction::Create
        } else if has("delete") {
            ChangeAction::Delete
        } else if has("update") {
            ChangeAction::Update
        } else if has("read") {
            ChangeAction::Read
        } else {
            ChangeAction::NoOp
        }
    }
}

/// Configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub root_module: ModuleConfig,
}

/// Declarations and expression trees of one module
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub module_calls: BTreeMap<String, ModuleCall>,
    #[serde(default, deserialize_with = "ordered_entries")]
    pub outputs: Vec<(String, OutputConfig)>,
    #[serde(default, deserialize_with = "ordered_entries")]
    pub variables: Vec<(String, VariableConfig)>,
}

impl ModuleConfig {
    /// Look up a declared output by name
    pub fn output(&self, name: &str) -> Option<&OutputConfig> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    /// Look up a declared variable by name
    pub fn variable(&self, name: &str) -> Option<&VariableConfig> {
        self.variables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Expression trees of one resource block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    /// Module-relative configuration address (`aws_subnet.private`)
    pub address: String,
    #[serde(default)]
    pub mode: ResourceMode,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    pub provider_config_key: Option<String>,
    #[serde(default)]
    pub expressions: Map<String, Value>,
    pub count_expression: Option<Value>,
    pub for_each_expression: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A `module` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleCall {
    pub source: Option<String>,
    /// Argument expressions, keyed by the child module's variable names
    #[serde(default)]
    pub expressions: Map<String, Value>,
    pub module: Option<Box<ModuleConfig>>,
    pub count_expression: Option<Value>,
    pub for_each_expression: Option<Value>,
}

/// An `output` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    pub expression: Option<Value>,
    #[serde(default)]
    pub sensitive: bool,
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A `variable` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableConfig {
    pub default: Option<Value>,
    pub description: Option<String>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type")]
    pub type_tag: Option<String>,
}

/// Deserialize a JSON object into `(key, value)` pairs in document order.
fn ordered_entries<'de, D, T>(deserializer: D) -> std::result::Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of declarations")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, T>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntriesVisitor(PhantomData))
}
