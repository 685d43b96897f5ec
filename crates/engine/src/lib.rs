//! Resolution engine turning plan documents into topology IR
//!
//! The engine reads a plan through a [`PlanIndex`], recovers the reference
//! graph and variable bindings the plan erased, and dispatches each resource
//! to a registered [`ResourceMapper`] in two phases: primary mappers build
//! nodes, then associative mappers link them. Recoverable problems become
//! [`Diagnostic`](topograph_core::Diagnostic)s on the [`MappingOutcome`].

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod bindings;
pub mod categories;
pub mod context;
pub mod dispatcher;
pub mod expressions;
pub mod filter;
pub mod index;
pub mod inputs;
pub mod mappers;
pub mod outputs;
pub mod references;
pub mod registry;
pub mod resolver;
pub mod walker;

pub use bindings::{VariableBinding, VariableBindingTracker, VariableDefinition};
pub use context::MappingContext;
pub use dispatcher::{Dispatcher, MappingOutcome};
pub use filter::{DependencyFilterSpec, SyntheticRule};
pub use index::PlanIndex;
pub use outputs::{OutputDefinition, OutputExtractor, OutputMapper};
pub use references::{EdgeOrigin, ReferenceEdge, ReferenceGraphExtractor};
pub use registry::{MapperRegistry, MapperRole, ResourceMapper};
pub use resolver::{PropertyResolver, ResolutionContext};
pub use walker::{PlanResource, PlanWalker};

use topograph_core::config::Config;
use topograph_core::error::Result;
use topograph_core::ir::{Topology, TopologyBuilder};
use topograph_core::plan::Plan;

/// Map a plan with the bundled mappers into an in-memory topology
///
/// # Errors
///
/// See [`Dispatcher::run`].
pub fn map_plan(plan: &Plan, config: &Config) -> Result<(Topology, MappingOutcome)> {
    let registry = MapperRegistry::with_defaults();
    let mut builder = TopologyBuilder::new();
    let outcome = Dispatcher::new(&registry, config).run(plan, &mut builder)?;
    Ok((builder.finish(), outcome))
}
