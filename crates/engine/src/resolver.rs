//! Context-dependent resolution of property values

use serde_json::Value;
use strum_macros::Display;
use topograph_core::ir::ResolvedValue;

use crate::bindings::VariableBindingTracker;
use crate::index::PlanIndex;

/// Where a resolved value is going to be emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionContext {
    /// Parameterizable node property
    Property,
    /// Human-facing metadata; never symbolic
    Metadata,
}

/// Resolves `(address, property)` to a literal or symbolic value.
///
/// Pure over the immutable index and binding state.
#[derive(Clone, Copy)]
pub struct PropertyResolver<'a> {
    index: &'a PlanIndex<'a>,
    bindings: &'a VariableBindingTracker,
}

impl<'a> PropertyResolver<'a> {
    pub fn new(index: &'a PlanIndex<'a>, bindings: &'a VariableBindingTracker) -> Self {
        Self { index, bindings }
    }

    pub fn resolve(&self, address: &str, property: &str, context: ResolutionContext) -> ResolvedValue {
        if context == ResolutionContext::Property {
            if let Some(binding) = self.bindings.binding(address, property) {
                return binding.to_value();
            }
        }
        ResolvedValue::Literal(self.concrete(address, property))
    }

    /// Concrete value; unknown values are `null`
    pub fn concrete(&self, address: &str, property: &str) -> Value {
        self.index
            .concrete_value(address, property)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topograph_core::diagnostics::Diagnostics;
    use topograph_core::plan::Plan;

    fn plan() -> Plan {
        Plan::from_value(json!({
            "planned_values": {"root_module": {"resources": [
                {"address": "aws_instance.web", "type": "aws_instance", "name": "web",
                 "values": {"instance_type": "t3.micro", "ami": "ami-1"}}
            ]}},
            "configuration": {"root_module": {
                "variables": {"instance_type": {"default": "t3.micro"}},
                "resources": [{"address": "aws_instance.web", "type": "aws_instance", "name": "web",
                    "expressions": {"instance_type": {"references": ["var.instance_type"]}}}]
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_property_context_is_symbolic_when_bound() {
        let plan = plan();
        let index = PlanIndex::build(&plan).unwrap();
        let tracker = VariableBindingTracker::build(&index, &mut Diagnostics::new());
        let resolver = PropertyResolver::new(&index, &tracker);

        assert_eq!(
            resolver.resolve("aws_instance.web", "instance_type", ResolutionContext::Property),
            ResolvedValue::SymbolicInput {
                variable: "instance_type".to_string(),
                key: None,
            }
        );
        assert_eq!(
            resolver.resolve("aws_instance.web", "ami", ResolutionContext::Property),
            ResolvedValue::literal("ami-1")
        );
    }

    #[test]
    fn test_metadata_context_is_always_literal() {
        let plan = plan();
        let index = PlanIndex::build(&plan).unwrap();
        let tracker = VariableBindingTracker::build(&index, &mut Diagnostics::new());
        let resolver = PropertyResolver::new(&index, &tracker);

        for _ in 0..2 {
            assert_eq!(
                resolver.resolve("aws_instance.web", "instance_type", ResolutionContext::Metadata),
                ResolvedValue::literal("t3.micro")
            );
        }
    }

    #[test]
    fn test_unknown_value_is_null() {
        let plan = plan();
        let index = PlanIndex::build(&plan).unwrap();
        let tracker = VariableBindingTracker::default();
        let resolver = PropertyResolver::new(&index, &tracker);
        assert_eq!(
            resolver.resolve("aws_instance.web", "public_ip", ResolutionContext::Property),
            ResolvedValue::Literal(Value::Null)
        );
        assert_eq!(resolver.concrete("aws_instance.missing", "id"), Value::Null);
    }
}
