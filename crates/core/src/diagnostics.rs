//! Structured diagnostics for recoverable conditions
//!
//! Anything the engine recovers from is recorded here instead of being
//! silently dropped. Every diagnostic is also emitted through `tracing` at
//! the moment it is recorded.

use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

/// Kind of recoverable condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    /// No mapper registered for a resource type
    UnsupportedResourceType,
    /// A mapper is registered but refused this payload
    CapabilityDeclined,
    /// An edge's target never materialized as a node
    ReferenceUnresolved,
    /// A value matched more than one variable or collection entry
    BindingAmbiguous,
    /// A mapper returned an error for one resource
    MapperFailure,
    /// An associative resource's endpoint node does not exist
    MissingEndpoint,
    /// The resolved-values root module is absent
    RootModuleMissing,
    /// A mapper registration replaced an earlier one
    RegistryOverwrite,
}

impl DiagnosticKind {
    /// Whether this kind means a resource was not mapped
    pub fn is_failure(&self) -> bool {
        matches!(self, DiagnosticKind::MapperFailure)
    }

    /// Conditions expected in normal runs are logged at debug level
    fn is_expected(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::UnsupportedResourceType | DiagnosticKind::RegistryOverwrite
        )
    }
}

/// One recorded condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            address: None,
            resource_type: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn at(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn of_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(address) = &self.address {
            write!(f, " {address}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Ordered collection of diagnostics for one run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.kind.is_expected() {
            debug!("{diagnostic}");
        } else {
            warn!("{diagnostic}");
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
