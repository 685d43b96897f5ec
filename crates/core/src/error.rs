use thiserror::Error;

/// Result type for topograph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for topograph operations
///
/// Only run-level failures live here. Per-resource problems that the engine
/// recovers from are reported as [`crate::diagnostics::Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The plan document is malformed or has no resolved root module
    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    /// A resource address could not be parsed
    #[error("Invalid resource address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// A single mapper failed on one resource
    #[error("Mapping {resource_type} at {address} failed: {message}")]
    Mapping {
        address: String,
        resource_type: String,
        message: String,
    },

    /// The orchestration logic itself failed
    #[error("Orchestration failure at {address} ({resource_type}): {message}")]
    Orchestration {
        address: String,
        resource_type: String,
        message: String,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an extraction failure
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::ExtractionFailure(msg.into())
    }

    /// Creates an invalid address error
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a mapper-level error for one resource
    pub fn mapping(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Mapping {
            address: address.into(),
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }

    /// Creates an orchestration error
    pub fn orchestration(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Orchestration {
            address: address.into(),
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_message() {
        let err = Error::mapping("aws_instance.web", "aws_instance", "boom");
        assert_eq!(
            err.to_string(),
            "Mapping aws_instance at aws_instance.web failed: boom"
        );
    }

    #[test]
    fn test_extraction_failure_message() {
        let err = Error::extraction("missing root module");
        assert!(err.to_string().contains("missing root module"));
    }

    #[test]
    fn test_result_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "plan.json",
        ));
        let err = res.context("Failed to read plan").unwrap_err();
        assert!(err.to_string().starts_with("Failed to read plan"));
    }
}
