//! Core types for the topograph plan-to-topology engine
//!
//! This crate provides the foundational abstractions shared by the engine
//! and the CLI:
//!
//! - **Plan model**: typed, read-only view of an infrastructure plan document
//! - **Addresses and node ids**: parsed resource addresses and the pure
//!   address-to-identifier function
//! - **Relationships**: the ordered relationship classification table
//! - **IR**: topology nodes, inputs, outputs and the builder seam
//! - **Diagnostics**: structured reporting of recoverable conditions
//! - **Configuration** and **error handling**
//!

pub mod address;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod node_id;
pub mod plan;
pub mod relationships;

// Re-export main types for convenience
pub use address::{InstanceKey, ModuleStep, ResourceAddress, ResourceMode};
pub use config::{Config, MappingConfig, OutputsConfig, ReferencesConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{Error, Result, ResultExt};
pub use ir::{
    CollectionKey, InputType, IrInput, IrNode, IrNodeBuilder, IrOutput, ModelBuilder,
    Requirement, ResolvedValue, Topology, TopologyBuilder,
};
pub use node_id::generate_node_id;
pub use plan::{ChangeAction, Plan};
pub use relationships::{classify, RelationshipKind};
