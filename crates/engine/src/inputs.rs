//! Root variables as IR inputs

use topograph_core::ir::{InputType, IrInput};

use crate::bindings::{TypeTag, VariableDefinition};

fn input_type(tag: &TypeTag) -> InputType {
    match tag {
        TypeTag::Number => InputType::Float,
        TypeTag::Bool => InputType::Boolean,
        TypeTag::List(_) => InputType::List,
        TypeTag::Map(_) => InputType::Map,
        TypeTag::String | TypeTag::Any => InputType::String,
    }
}

fn entry_schema(tag: &TypeTag) -> Option<InputType> {
    match tag {
        TypeTag::List(inner) | TypeTag::Map(inner) if **inner != TypeTag::Any => {
            Some(input_type(inner))
        }
        _ => None,
    }
}

/// Translate root variable definitions, keeping declaration order
pub fn translate_inputs(variables: &[VariableDefinition]) -> Vec<IrInput> {
    variables
        .iter()
        .map(|var| IrInput {
            name: var.name.clone(),
            input_type: input_type(&var.type_tag),
            entry_schema: entry_schema(&var.type_tag),
            required: var.default.is_none(),
            default: var.default.clone(),
            description: var.description.clone(),
        })
        .collect()
}
