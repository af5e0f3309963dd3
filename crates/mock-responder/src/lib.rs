//! Mock responder implementations for exercising the routing orchestrator.
//!
//! This crate provides doubles of the `Responder` and `IntentClassifier` traits:
//! - `EchoResponder` - Echoes the prompt back, optionally prefixed
//! - `StaticResponder` - Always returns the same text
//! - `ScriptedResponder` - Plays back a queue of outcomes and records every call
//! - `FailingResponder` - Always fails
//! - `DelayedResponder` - Wraps another responder with artificial latency
//! - `FixedClassifier` - Returns a preset intent analysis (or error)
//!
//! # Example
//!
//! ```rust
//! use mock_responder::{Responder, SessionContext, StaticResponder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_responder::InvocationError> {
//!     let responder = StaticResponder::new("sleep", "夜泣きは成長の一部です。");
//!     let text = responder.invoke("夜泣きが心配", &SessionContext::default()).await?;
//!     assert_eq!(text, "夜泣きは成長の一部です。");
//!     Ok(())
//! }
//! ```

mod classifier;
mod delayed;
mod echo;
mod scripted;

// Re-export responder-core types for convenience
pub use responder_core::{
    async_trait, IntentAnalysis, IntentClassifier, InvocationError, Responder, SessionContext,
};

pub use classifier::FixedClassifier;
pub use delayed::DelayedResponder;
pub use echo::{EchoResponder, StaticResponder};
pub use scripted::{FailingResponder, ScriptedResponder};
