//! Error taxonomy for the factory workflow.
//!
//! Validators never produce these directly: they return structured
//! violations which the phase executors feed back into retry prompts. Only
//! exhausted retries and precondition violations surface as `FactoryError`.

use crate::agents::GenerationError;
use crate::state::Phase;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FactoryError {
    /// Precondition violation on phase entry. Never retried.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Architect output failed the blueprint validator after all retries.
    #[error("blueprint schema violation: {detail}")]
    SchemaViolation { detail: String },

    /// Builder output failed the code validator after all retries.
    #[error("code generation failed validation: {detail}")]
    CodeValidation { detail: String },

    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("generation service rate limited: {0}")]
    RateLimited(String),

    /// Every backend for the task is missing or rejected its credentials.
    #[error("generation backend misconfigured: {0}")]
    BackendMisconfigured(String),

    /// Raised when the revision cap is reached under the `fail` policy.
    #[error("revision limit exceeded after {revisions} revision(s)")]
    RevisionLimitExceeded { revisions: u32 },

    /// The workflow was cancelled while suspended; state was left untouched.
    #[error("workflow cancelled")]
    Cancelled,
}

impl FactoryError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Precondition error for an operation attempted in the wrong phase.
    pub fn wrong_phase(operation: &str, expected: &[Phase], actual: Phase) -> Self {
        let expected = expected
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        Self::invalid_input(format!(
            "cannot {} in phase {} (expected {})",
            operation, actual, expected
        ))
    }

    /// Returns true for errors the orchestrator may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::RateLimited(_))
    }
}

impl From<GenerationError> for FactoryError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::ServiceUnavailable(msg) => Self::ServiceUnavailable(msg),
            GenerationError::RateLimited(msg) => Self::RateLimited(msg),
            GenerationError::Misconfigured(msg) => Self::BackendMisconfigured(msg),
        }
    }
}
