//! Routing decision types.

use serde::{Deserialize, Serialize};

/// Where a routing decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// An emergency/forced keyword matched.
    ForcedKeyword,
    /// Keyword tally picked the winner.
    KeywordScore,
    /// Keyword tally combined with LLM intent analysis.
    HybridLlm,
    /// Nothing matched; the generalist takes it.
    Default,
    /// The caller's request mode (forced responder or parallel) decided.
    Explicit,
}

/// Who should answer: one responder, or several in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "ids", rename_all = "snake_case")]
pub enum RoutingTarget {
    Single(String),
    Parallel(Vec<String>),
}

impl RoutingTarget {
    /// All responder ids named by this target.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Single(id) => vec![id.as_str()],
            Self::Parallel(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel(_))
    }
}

/// The outcome of routing one request. Immutable once made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub target: RoutingTarget,
    /// 0.0 - 1.0.
    pub confidence: f32,
    /// Human-readable explanation; never empty.
    pub reasoning: String,
    pub source: DecisionSource,
}

impl RoutingDecision {
    /// Create a single-responder decision.
    pub fn single(
        id: impl Into<String>,
        confidence: f32,
        reasoning: impl Into<String>,
        source: DecisionSource,
    ) -> Self {
        Self::build(RoutingTarget::Single(id.into()), confidence, reasoning, source)
    }

    /// Create a parallel decision.
    pub fn parallel(
        ids: Vec<String>,
        confidence: f32,
        reasoning: impl Into<String>,
        source: DecisionSource,
    ) -> Self {
        Self::build(RoutingTarget::Parallel(ids), confidence, reasoning, source)
    }

    fn build(
        target: RoutingTarget,
        confidence: f32,
        reasoning: impl Into<String>,
        source: DecisionSource,
    ) -> Self {
        let mut reasoning = reasoning.into();
        if reasoning.trim().is_empty() {
            reasoning = format!("routed via {:?}", source);
        }
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            target,
            confidence,
            reasoning,
            source,
        }
    }

    /// The single primary responder, if this is not a parallel decision.
    pub fn primary_id(&self) -> Option<&str> {
        match &self.target {
            RoutingTarget::Single(id) => Some(id),
            RoutingTarget::Parallel(_) => None,
        }
    }

    /// Short description for logging.
    pub fn description(&self) -> String {
        match &self.target {
            RoutingTarget::Single(id) => format!(
                "{} ({:?}, confidence {:.2})",
                id, self.source, self.confidence
            ),
            RoutingTarget::Parallel(ids) => format!(
                "parallel [{}] ({:?}, confidence {:.2})",
                ids.join(", "),
                self.source,
                self.confidence
            ),
        }
    }
}
