//! Core traits and types for specialist responders.
//!
//! This crate provides the shared interface between the routing orchestrator
//! and the specialists it consults. It defines:
//!
//! - [`Responder`] - An opaque capability that turns a prompt into text
//! - [`IntentClassifier`] - External intent analysis used by hybrid routing
//! - [`InvocationError`] - Error types for responder and classifier calls
//! - [`ConversationTurn`] / [`FamilyProfile`] / [`SessionContext`] - Per-request inputs
//!
//! # Example
//!
//! ```rust
//! use responder_core::{async_trait, InvocationError, Responder, SessionContext};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Responder for Greeter {
//!     async fn invoke(
//!         &self,
//!         prompt: &str,
//!         _session: &SessionContext,
//!     ) -> Result<String, InvocationError> {
//!         Ok(format!("Hello! You said: {}", prompt))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Greeter"
//!     }
//! }
//! ```

mod classifier;
mod error;
mod message;
mod prompt;
mod responder;

pub use classifier::{IntentAnalysis, IntentClassifier};
pub use error::InvocationError;
pub use message::{ConversationTurn, FamilyProfile, MediaAttachment, SessionContext, TurnRole};
pub use prompt::{hash_prompt, prompt_fingerprint};
pub use responder::Responder;

// Re-export async_trait for convenience
pub use async_trait::async_trait;
