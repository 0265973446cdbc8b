//! Pipeline error types.
//!
//! Only `PipelineError` ever reaches the caller of a run. `StageError` is
//! recorded against a single item and never aborts the batch.

use docket_client::{AcquireError, GenerateError};
use docket_core::ConfigError;

/// Run-level errors. Raised before any item is processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("PRECONDITION_FAILED: {field}: {hint}")]
    Precondition { field: String, hint: String },
}

impl PipelineError {
    pub fn precondition(field: impl Into<String>, hint: impl Into<String>) -> Self {
        PipelineError::Precondition { field: field.into(), hint: hint.into() }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field, hint } => PipelineError::Precondition { field, hint },
            ConfigError::Invalid { field, reason } => PipelineError::Precondition { field, hint: reason },
            ConfigError::LoadFailed(reason) => PipelineError::Precondition { field: "config".into(), hint: reason },
        }
    }
}

/// Per-item failure at one stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("EXTRACTION_EXHAUSTED: no strategy produced a record with field `{0}`")]
    ExtractionExhausted(String),

    #[error(transparent)]
    Cache(#[from] docket_core::Error),

    #[error("TASK_PANICKED: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_become_preconditions() {
        let err: PipelineError = ConfigError::Missing { field: "llm_api_key".into(), hint: "set it".into() }.into();
        assert_eq!(err.to_string(), "PRECONDITION_FAILED: llm_api_key: set it");

        let err: PipelineError = ConfigError::Invalid { field: "max_concurrency".into(), reason: "too big".into() }.into();
        assert!(matches!(err, PipelineError::Precondition { ref field, .. } if field == "max_concurrency"));
    }

    #[test]
    fn test_stage_error_display() {
        let err = StageError::ExtractionExhausted("cases".into());
        assert!(err.to_string().starts_with("EXTRACTION_EXHAUSTED"));
        assert!(err.to_string().contains("`cases`"));
    }
}
