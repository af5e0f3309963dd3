//! Error types for responder and classifier invocations.

use thiserror::Error;

/// Errors that can occur while invoking a responder or classifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The responder is temporarily unavailable (transport down, not registered).
    #[error("responder unavailable: {0}")]
    Unavailable(String),

    /// The call reached the responder but failed.
    #[error("invocation failed: {0}")]
    Failed(String),

    /// The call did not complete before its deadline.
    #[error("invocation timed out")]
    Timeout,

    /// The responder is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl InvocationError {
    /// Whether this error came from a deadline rather than the responder itself.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
