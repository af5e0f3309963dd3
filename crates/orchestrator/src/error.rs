//! Error types for orchestrator operations.

use responder_core::InvocationError;
use thiserror::Error;

use crate::request::FailureKind;

/// Errors that can occur while building or running the orchestrator.
///
/// Building the orchestrator and running intent analysis return these
/// directly. Failures while handling a request are recovered inside the
/// executor and only appear in logs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A routing decision or lookup named a responder that is not in the catalog.
    #[error("unknown responder: {0}")]
    UnknownResponder(String),

    /// Two catalog entries share an id.
    #[error("duplicate responder id: {0}")]
    DuplicateResponder(String),

    /// The catalog is malformed.
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A responder call failed or timed out.
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// A responder answered but the text did not pass quality checks.
    #[error("quality validation failed: {0}")]
    QualityValidation(String),

    /// All attempts on a responder failed.
    #[error("responder {responder_id} exhausted {attempts} attempt(s)")]
    ExhaustedRetries { responder_id: String, attempts: u32 },

    /// Intent classification failed or returned unusable output.
    #[error("classification failed: {0}")]
    Classification(String),
}

impl From<FailureKind> for OrchestratorError {
    fn from(failure: FailureKind) -> Self {
        match failure {
            FailureKind::Invocation(message) => Self::Invocation(InvocationError::Failed(message)),
            FailureKind::Unavailable(message) => {
                Self::Invocation(InvocationError::Unavailable(message))
            }
            FailureKind::Timeout => Self::Invocation(InvocationError::Timeout),
            FailureKind::Quality(issue) => Self::QualityValidation(issue.to_string()),
        }
    }
}
