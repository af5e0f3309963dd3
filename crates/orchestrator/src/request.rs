//! Request, result and diagnostics types for one orchestration.

use responder_core::{ConversationTurn, FamilyProfile, MediaAttachment, SessionContext};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::RoutingDecision;
use crate::quality::QualityIssue;

/// Routing-path entry recorded when the static apology answered.
pub const STATIC_FALLBACK_MARKER: &str = "static_fallback";

/// How the caller wants the request routed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "responder_id", rename_all = "snake_case")]
pub enum RequestMode {
    /// Let the configured strategy decide.
    #[default]
    Auto,
    /// Send straight to this responder.
    Forced(String),
    /// Consult a panel of specialists concurrently.
    Parallel,
}

/// One user request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub profile: Option<FamilyProfile>,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub attachments: Vec<MediaAttachment>,
}

impl Request {
    pub fn new(
        message: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            history: Vec::new(),
            profile: None,
            mode: RequestMode::Auto,
            attachments: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_profile(mut self, profile: FamilyProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<MediaAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn has_media(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Session information handed to responders.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(&self.user_id, &self.session_id)
            .with_attachments(self.attachments.clone())
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureKind {
    /// The responder raised an error.
    Invocation(String),
    /// No responder implementation could be reached.
    Unavailable(String),
    /// The attempt was cancelled by a deadline.
    Timeout,
    /// The responder answered, but the answer was rejected.
    Quality(QualityIssue),
}

/// One invocation attempt on one responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderResult {
    pub responder_id: String,
    /// 1-based; never exceeds `1 + max_retries`.
    pub attempt: u32,
    pub success: bool,
    pub text: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
}

impl ResponderResult {
    pub fn succeeded(responder_id: &str, attempt: u32, text: String, latency_ms: u64) -> Self {
        Self {
            responder_id: responder_id.to_string(),
            attempt,
            success: true,
            text,
            latency_ms,
            error: None,
        }
    }

    pub fn failed(responder_id: &str, attempt: u32, error: FailureKind, latency_ms: u64) -> Self {
        Self {
            responder_id: responder_id.to_string(),
            attempt,
            success: false,
            text: String::new(),
            latency_ms,
            error: Some(error),
        }
    }
}

/// Executor states, recorded in order as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Select,
    Validate,
    Execute,
    QualityCheck,
    Retry,
    CrossRoute,
    Fallback,
    Done,
}

/// Which fallback tier produced the answer, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    Generalist,
    StaticApology,
}

/// The single cross-route hop, if one happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRoute {
    pub from: String,
    pub to: String,
    /// The handoff phrase found in the primary's answer.
    pub phrase: String,
    /// Whether the target produced an acceptable answer.
    pub succeeded: bool,
}

/// Where the follow-up questions came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpSource {
    /// Extracted from the responder's own answer.
    Embedded,
    /// Produced by the lightweight follow-up responder.
    Generated,
    /// The fixed generic set.
    StaticFallback,
    #[default]
    None,
}

/// Everything observed while handling one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub request_id: Uuid,
    pub decision: RoutingDecision,
    /// Corrections VALIDATE applied to the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<String>,
    /// Every attempt, in execution order (parallel attempts sorted by rank).
    pub attempts: Vec<ResponderResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_route: Option<CrossRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackTier>,
    pub stages: Vec<Stage>,
    pub follow_up_source: FollowUpSource,
    pub prompt_fingerprint: String,
    pub total_latency_ms: u64,
}

impl Diagnostics {
    /// Attempts that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ResponderResult> {
        self.attempts.iter().filter(|r| !r.success)
    }

    /// Number of attempts made on one responder.
    pub fn attempts_on(&self, responder_id: &str) -> usize {
        self.attempts
            .iter()
            .filter(|r| r.responder_id == responder_id)
            .count()
    }
}

/// Terminal result of [`Orchestrator::handle`](crate::Orchestrator::handle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Never empty.
    pub final_text: String,
    /// At most three, in source order.
    pub follow_up_questions: Vec<String>,
    /// Responder ids visited, in order; ends with
    /// [`STATIC_FALLBACK_MARKER`] when the apology answered.
    pub routing_path: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl OrchestrationResult {
    /// Whether the static apology produced the answer.
    pub fn is_static_fallback(&self) -> bool {
        self.diagnostics.fallback == Some(FallbackTier::StaticApology)
    }
}
