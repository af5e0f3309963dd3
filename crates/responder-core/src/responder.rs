//! The Responder trait definition.

use async_trait::async_trait;

use crate::error::InvocationError;
use crate::message::SessionContext;

/// A specialist that turns a fully built prompt into natural-language text.
///
/// Implementations range from canned test doubles to full LLM agents.
/// This trait is object-safe and is normally held as `Arc<dyn Responder>`.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a response for the given prompt.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The enriched prompt (profile, history and current message).
    /// * `session` - Per-request session information.
    ///
    /// # Returns
    ///
    /// The raw response text, which may still contain embedded follow-up
    /// markers, or an error if the call failed.
    async fn invoke(
        &self,
        prompt: &str,
        session: &SessionContext,
    ) -> Result<String, InvocationError>;

    /// Get a human-readable name for this responder implementation.
    fn name(&self) -> &str;

    /// Check if the responder is ready to take calls.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
