//! Two-phase dispatch of plan resources to mappers
//!
//! Every primary resource is mapped before any associative resource, so
//! associative mappers always find their endpoint nodes if they exist at
//! all. Per-resource problems are recorded as diagnostics and the run
//! continues; only extraction failures and faults in the dispatch logic
//! itself abort a run.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use topograph_core::config::Config;
use topograph_core::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use topograph_core::error::{Error, Result};
use topograph_core::ir::ModelBuilder;
use topograph_core::plan::Plan;
use tracing::{debug, info, trace};

use crate::bindings::VariableBindingTracker;
use crate::context::MappingContext;
use crate::index::PlanIndex;
use crate::inputs::translate_inputs;
use crate::outputs::{OutputExtractor, OutputMapper};
use crate::references::ReferenceGraphExtractor;
use crate::registry::{MapperRegistry, MapperRole};
use crate::resolver::PropertyResolver;
use crate::walker::PlanResource;

/// Summary of one mapping run
#[derive(Debug, Default, Serialize)]
pub struct MappingOutcome {
    pub diagnostics: Diagnostics,
    /// Addresses whose mapper returned an error or panicked
    pub failed_resources: Vec<String>,
    /// Resources mapped without error
    pub mapped: usize,
    /// Resources skipped (unsupported type or declined payload)
    pub skipped: usize,
}

impl MappingOutcome {
    pub fn has_failures(&self) -> bool {
        !self.failed_resources.is_empty()
            || self.diagnostics.iter().any(|d| d.kind.is_failure())
    }
}

/// Read-only state shared by every mapper call of a run
struct RunState<'a> {
    index: &'a PlanIndex<'a>,
    references: &'a ReferenceGraphExtractor<'a>,
    bindings: &'a VariableBindingTracker,
}

pub struct Dispatcher<'r> {
    registry: &'r MapperRegistry,
    config: &'r Config,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r MapperRegistry, config: &'r Config) -> Self {
        Self { registry, config }
    }

    /// Map a whole plan into `builder`.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionFailure` if the plan is malformed, has no resolved
    /// root module, or (with `fail_on_empty_plan`) has no resources; and
    /// `Orchestration` if dispatch itself faults. Mapper errors are not
    /// returned; see [`MappingOutcome::failed_resources`].
    pub fn run(&self, plan: &Plan, builder: &mut dyn ModelBuilder) -> Result<MappingOutcome> {
        let index = PlanIndex::build(plan)?;
        if index.root_missing() {
            return Err(Error::extraction("plan has no resolved-values root module"));
        }

        let mut outcome = MappingOutcome::default();
        outcome.diagnostics.extend(self.registry.diagnostics().clone());
        outcome.diagnostics.extend(index.walk_diagnostics().clone());

        if index.resources().is_empty() {
            if self.config.mapping.fail_on_empty_plan {
                return Err(Error::extraction("plan contains no resources"));
            }
            info!("Plan contains no resources");
        }

        let references = ReferenceGraphExtractor::new(&index, &self.config.references);
        let bindings = VariableBindingTracker::build(&index, &mut outcome.diagnostics);
        let state = RunState {
            index: &index,
            references: &references,
            bindings: &bindings,
        };

        let (primary, associative) = self.classify(&index, &mut outcome);
        info!(
            "Dispatching {} primary and {} associative resources",
            primary.len(),
            associative.len()
        );
        for resource in primary {
            self.dispatch(&state, resource, builder, &mut outcome)?;
        }
        for resource in associative {
            self.dispatch(&state, resource, builder, &mut outcome)?;
        }

        for (node_id, requirement) in builder.drop_dangling_requirements() {
            outcome.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::ReferenceUnresolved,
                    format!(
                        "{} requirement on {} dropped: target was never mapped",
                        requirement.name, requirement.target
                    ),
                )
                .at(node_id),
            );
        }

        builder.set_inputs(translate_inputs(bindings.variables()));
        let outputs = OutputMapper::new(&self.config.outputs).map(
            &OutputExtractor::extract(&index),
            &index,
            &*builder,
            &mut outcome.diagnostics,
        );
        builder.set_outputs(outputs);

        info!(
            "Mapped {} resources into {} nodes ({} skipped, {} failed, {} diagnostics)",
            outcome.mapped,
            builder.node_count(),
            outcome.skipped,
            outcome.failed_resources.len(),
            outcome.diagnostics.len()
        );
        Ok(outcome)
    }

    /// Split dispatchable resources by their mapper's role, in plan order
    fn classify<'i>(
        &self,
        index: &'i PlanIndex<'_>,
        outcome: &mut MappingOutcome,
    ) -> (Vec<&'i PlanResource>, Vec<&'i PlanResource>) {
        let mut primary = Vec::new();
        let mut associative = Vec::new();

        for resource in index.resources() {
            if resource.is_data() && self.config.mapping.skip_data_sources {
                trace!("Skipping data source {}", resource.address);
                continue;
            }
            match self.registry.role_of(&resource.resource_type) {
                Some(MapperRole::Primary) => primary.push(resource),
                Some(MapperRole::Associative) => associative.push(resource),
                None => {
                    outcome.skipped += 1;
                    outcome.diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::UnsupportedResourceType,
                            format!("no mapper for {}", resource.resource_type),
                        )
                        .at(&resource.address)
                        .of_type(&resource.resource_type),
                    );
                }
            }
        }
        (primary, associative)
    }

    fn dispatch(
        &self,
        state: &RunState<'_>,
        resource: &PlanResource,
        builder: &mut dyn ModelBuilder,
        outcome: &mut MappingOutcome,
    ) -> Result<()> {
        let Some(mapper) = self.registry.get(&resource.resource_type) else {
            return Err(Error::orchestration(
                &resource.address,
                &resource.resource_type,
                "mapper disappeared between classification and dispatch",
            ));
        };

        if !mapper.can_map(&resource.resource_type, &resource.values) {
            outcome.skipped += 1;
            outcome.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::CapabilityDeclined,
                    "mapper declined this payload",
                )
                .at(&resource.address)
                .of_type(&resource.resource_type),
            );
            return Ok(());
        }

        debug!("Mapping {} ({})", resource.address, mapper.role());
        let mut ctx = MappingContext {
            index: state.index,
            references: state.references,
            bindings: state.bindings,
            resolver: PropertyResolver::new(state.index, state.bindings),
            config: self.config,
            builder,
            diagnostics: &mut outcome.diagnostics,
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| mapper.map(&mut ctx, resource)));
        let failure = match result {
            Ok(Ok(())) => {
                outcome.mapped += 1;
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("mapper panicked: {}", panic_message(payload.as_ref())),
        };
        outcome.diagnostics.push(
            Diagnostic::new(DiagnosticKind::MapperFailure, failure)
                .at(&resource.address)
                .of_type(&resource.resource_type),
        );
        outcome.failed_resources.push(resource.address.clone());
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
