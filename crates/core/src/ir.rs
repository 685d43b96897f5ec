//! Topology IR model and the builder seam the engine emits through.

use derive_builder::Builder;
use im::OrdMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

use crate::relationships::RelationshipKind;

/// Key into a collection-typed input: a map key or a list index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionKey {
    Index(usize),
    Key(String),
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionKey::Index(i) => write!(f, "[{i}]"),
            CollectionKey::Key(k) => write!(f, "[\"{k}\"]"),
        }
    }
}

/// A property value as emitted into the IR
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Concrete value, copied from the plan
    Literal(Value),
    /// Value supplied by an input parameter (optionally one collection entry)
    SymbolicInput {
        variable: String,
        key: Option<CollectionKey>,
    },
    /// Value read from an attribute of another node
    SymbolicAttribute { node_id: String, attribute: String },
}

impl ResolvedValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ResolvedValue::Literal(value.into())
    }

    pub fn is_symbolic(&self) -> bool {
        !matches!(self, ResolvedValue::Literal(_))
    }

    /// The concrete value, if this is a literal
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ResolvedValue::Literal(v) => Some(v),
            _ => None,
        }
    }
}

/// Literals serialize as themselves, symbolic values as IR functions:
/// `{"get_input": name}`, `{"get_input": [name, key]}` and
/// `{"get_attribute": [node, attribute]}`.
impl Serialize for ResolvedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResolvedValue::Literal(value) => value.serialize(serializer),
            ResolvedValue::SymbolicInput { variable, key } => {
                let mut map = serializer.serialize_map(Some(1))?;
                match key {
                    None => map.serialize_entry("get_input", variable)?,
                    Some(CollectionKey::Index(i)) => {
                        map.serialize_entry("get_input", &(variable, i))?
                    }
                    Some(CollectionKey::Key(k)) => {
                        map.serialize_entry("get_input", &(variable, k))?
                    }
                }
                map.end()
            }
            ResolvedValue::SymbolicAttribute { node_id, attribute } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("get_attribute", &(node_id, attribute))?;
                map.end()
            }
        }
    }
}

/// A requirement of one node on another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// Requirement name (usually the plan property that carried the reference)
    pub name: String,
    /// Target node identifier
    pub target: String,
    pub relationship: RelationshipKind,
}

/// A node of the topology
#[derive(Debug, Clone, Serialize, Builder)]
#[builder(setter(into))]
pub struct IrNode {
    pub id: String,

    /// IR node type (e.g. `Compute`, `Network`)
    pub node_type: String,

    #[builder(default = "Vec::new()")]
    pub capabilities: Vec<String>,

    #[builder(default = "Vec::new()")]
    pub requirements: Vec<Requirement>,

    /// Parameterizable properties
    #[builder(default = "OrdMap::new()")]
    pub properties: OrdMap<String, ResolvedValue>,

    /// Human-facing descriptive data, always concrete
    #[builder(default = "OrdMap::new()")]
    pub metadata: OrdMap<String, Value>,
}

/// IR input parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    String,
    Float,
    Boolean,
    List,
    Map,
}

/// A template input parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_schema: Option<InputType>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A template output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrOutput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: ResolvedValue,
}

/// Finished topology
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    pub nodes: Vec<IrNode>,
    pub inputs: Vec<IrInput>,
    pub outputs: Vec<IrOutput>,
}

impl Topology {
    pub fn node(&self, id: &str) -> Option<&IrNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn output(&self, name: &str) -> Option<&IrOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&IrInput> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

/// Sink for emitted IR
///
/// The engine owns one builder exclusively for the duration of a run; it
/// never needs interior mutability or locking.
pub trait ModelBuilder {
    /// Add a node. Returns false (and keeps the existing node) on a duplicate id.
    fn add_node(&mut self, node: IrNode) -> bool;

    fn has_node(&self, id: &str) -> bool;

    fn node(&self, id: &str) -> Option<&IrNode>;

    /// Attach a requirement to an existing node. Returns false if the node
    /// does not exist.
    fn add_requirement(&mut self, node_id: &str, requirement: Requirement) -> bool;

    /// Remove requirements whose target never materialized, returning them
    /// with the id of the node they were removed from.
    fn drop_dangling_requirements(&mut self) -> Vec<(String, Requirement)>;

    fn set_inputs(&mut self, inputs: Vec<IrInput>);

    fn set_outputs(&mut self, outputs: Vec<IrOutput>);

    fn node_count(&self) -> usize;
}

/// In-memory builder producing a [`Topology`]
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: BTreeMap<String, IrNode>,
    inputs: Vec<IrInput>,
    outputs: Vec<IrOutput>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the builder; nodes come out sorted by id
    pub fn finish(self) -> Topology {
        Topology {
            nodes: self.nodes.into_values().collect(),
            inputs: self.inputs,
            outputs: self.outputs,
        }
    }
}

impl ModelBuilder for TopologyBuilder {
    fn add_node(&mut self, node: IrNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn node(&self, id: &str) -> Option<&IrNode> {
        self.nodes.get(id)
    }

    fn add_requirement(&mut self, node_id: &str, requirement: Requirement) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return false;
        };
        if !node.requirements.contains(&requirement) {
            node.requirements.push(requirement);
        }
        true
    }

    fn drop_dangling_requirements(&mut self) -> Vec<(String, Requirement)> {
        let existing: std::collections::HashSet<String> = self.nodes.keys().cloned().collect();
        let mut dropped = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            let (kept, gone): (Vec<_>, Vec<_>) = node
                .requirements
                .drain(..)
                .partition(|r| existing.contains(&r.target));
            node.requirements = kept;
            dropped.extend(gone.into_iter().map(|r| (id.clone(), r)));
        }
        dropped
    }

    fn set_inputs(&mut self, inputs: Vec<IrInput>) {
        self.inputs = inputs;
    }

    fn set_outputs(&mut self, outputs: Vec<IrOutput>) {
        self.outputs = outputs;
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node(id: &str) -> IrNode {
        IrNodeBuilder::default()
            .id(id)
            .node_type("Compute")
            .build()
            .unwrap()
    }

    fn req(target: &str) -> Requirement {
        Requirement {
            name: "subnet_id".to_string(),
            target: target.to_string(),
            relationship: RelationshipKind::DependsOn,
        }
    }

    #[test]
    fn test_resolved_value_serialization() {
        assert_eq!(
            serde_json::to_value(ResolvedValue::literal("t3.micro")).unwrap(),
            json!("t3.micro")
        );
        assert_eq!(
            serde_json::to_value(ResolvedValue::SymbolicInput {
                variable: "instance_type".to_string(),
                key: None,
            })
            .unwrap(),
            json!({"get_input": "instance_type"})
        );
        assert_eq!(
            serde_json::to_value(ResolvedValue::SymbolicInput {
                variable: "cidrs".to_string(),
                key: Some(CollectionKey::Key("public".to_string())),
            })
            .unwrap(),
            json!({"get_input": ["cidrs", "public"]})
        );
        assert_eq!(
            serde_json::to_value(ResolvedValue::SymbolicAttribute {
                node_id: "aws_instance-web".to_string(),
                attribute: "public_address".to_string(),
            })
            .unwrap(),
            json!({"get_attribute": ["aws_instance-web", "public_address"]})
        );
    }

    #[test]
    fn test_builder_rejects_duplicate_ids() {
        let mut builder = TopologyBuilder::new();
        assert!(builder.add_node(node("a")));
        assert!(!builder.add_node(node("a")));
        assert_eq!(builder.node_count(), 1);
    }

    #[test]
    fn test_add_requirement_requires_node() {
        let mut builder = TopologyBuilder::new();
        assert!(!builder.add_requirement("missing", req("b")));
        builder.add_node(node("a"));
        assert!(builder.add_requirement("a", req("b")));
        assert!(builder.add_requirement("a", req("b")));
        assert_eq!(builder.node("a").unwrap().requirements.len(), 1);
    }

    #[test]
    fn test_drop_dangling_requirements() {
        let mut builder = TopologyBuilder::new();
        builder.add_node(node("a"));
        builder.add_node(node("b"));
        builder.add_requirement("a", req("b"));
        builder.add_requirement("a", req("ghost"));

        let dropped = builder.drop_dangling_requirements();
        assert_eq!(dropped, vec![("a".to_string(), req("ghost"))]);

        let topology = builder.finish();
        assert_eq!(topology.node("a").unwrap().requirements, vec![req("b")]);
    }

    #[test]
    fn test_finish_sorts_nodes() {
        let mut builder = TopologyBuilder::new();
        builder.add_node(node("z"));
        builder.add_node(node("m"));
        let ids: Vec<String> = builder.finish().nodes.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }
}
