//! Specialist routing orchestrator for a childcare consultation assistant.
//!
//! This crate provides the [`Orchestrator`] type which routes a parent's
//! question to the best-suited specialist responder, validates the answer
//! and returns it with follow-up suggestions.
//!
//! # Features
//!
//! - Keyword and hybrid (keyword + LLM intent analysis) routing strategies
//! - Forced emergency keywords and multi-specialist parallel consultations
//! - Bounded retries with answer quality validation
//! - Single-hop cross-routing when one specialist defers to another
//! - Tiered fallback: generalist, then a static apology
//! - Follow-up question extraction and generation
//!
//! # Architecture
//!
//! ```text
//! Request (message, history, profile, mode)
//!          ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. Build prompt (profile, history, current message)        │
//! │         ↓                                                   │
//! │  2. Decide: strategy, or the caller's forced/parallel mode  │
//! │         ↓                                                   │
//! │  3. Execute:                                                │
//! │     • validate → correct unknown ids / media responders     │
//! │     • invoke   → quality check, retry up to 2 times         │
//! │     • parallel → one task per responder, shared deadline    │
//! │     • referral → one cross-route hop                        │
//! │     • fallback → generalist, then static apology            │
//! │         ↓                                                   │
//! │  4. Extract or generate follow-up questions                 │
//! └─────────────────────────────────────────────────────────────┘
//!          ↓
//! OrchestrationResult (final text, follow-ups, path, diagnostics)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use orchestrator::{Orchestrator, Request};
//!
//! let orchestrator = Orchestrator::builder()
//!     .responder("sleep", SleepSpecialist::new())
//!     .responder("generalist", Generalist::new())
//!     .build()?;
//!
//! let result = orchestrator
//!     .handle(Request::new("3ヶ月の子の夜泣きがひどいです", "user-1", "session-1"))
//!     .await;
//!
//! println!("{}", result.final_text);
//! for question in &result.follow_up_questions {
//!     println!("💭 {}", question);
//! }
//! ```

mod catalog;
mod classifier;
mod config;
mod context;
mod decision;
mod error;
mod executor;
mod followups;
mod orchestrator;
mod quality;
mod registry;
mod request;
mod strategy;

// Public exports
pub use catalog::{
    ConfidenceRating, ResponderCatalog, ResponderDescriptor, EMERGENCY_ID, GENERALIST_ID,
};
pub use classifier::{
    extract_balanced_json, extract_json, load_classifier_prompt, ResponderIntentClassifier,
    DEFAULT_CLASSIFIER_PROMPT, DEFAULT_CLASSIFIER_PROMPT_FILE,
};
pub use config::OrchestratorConfig;
pub use context::{Age, ContextBuilder, DEFAULT_MAX_HISTORY_TURNS, DEFAULT_MAX_TURN_CHARS};
pub use decision::{DecisionSource, RoutingDecision, RoutingTarget};
pub use error::OrchestratorError;
pub use executor::{CrossRouteMode, Execution, ExecutorConfig, RoutingExecutor, DEFAULT_APOLOGY};
pub use followups::{
    extract_follow_ups, extract_follow_ups_with, FollowUpExtraction, FollowUpGenerator,
    FollowUps, DEFAULT_FOLLOW_UP_MARKER, MAX_FOLLOW_UPS, STATIC_FOLLOW_UPS,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use quality::{topical_terms, QualityChecker, QualityIssue, DEFAULT_MIN_RESPONSE_CHARS};
pub use registry::ResponderSet;
pub use request::{
    CrossRoute, Diagnostics, FailureKind, FallbackTier, FollowUpSource, OrchestrationResult,
    Request, RequestMode, ResponderResult, Stage, STATIC_FALLBACK_MARKER,
};
pub use strategy::{
    keyword_confidence, HybridLlmRoutingStrategy, HybridWeights, KeywordConfig,
    KeywordRoutingStrategy, RoutingStrategy, StrategyKind,
};

// Re-export commonly used types from dependencies
pub use responder_core::{
    ConversationTurn, FamilyProfile, IntentAnalysis, IntentClassifier, InvocationError,
    MediaAttachment, Responder, SessionContext, TurnRole,
};
