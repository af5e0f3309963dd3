//! Intent classification capability used by hybrid routing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InvocationError;

/// Structured intent analysis of a user message.
///
/// Produced by an external classifier (usually an LLM) and consumed by the
/// hybrid routing strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    /// Free-form intent label, e.g. `"question"` or `"worry"`.
    #[serde(default)]
    pub intent_type: String,
    /// 1 (routine) to 5 (emergency).
    #[serde(default = "default_urgency")]
    pub urgency_level: u8,
    #[serde(default)]
    pub emotion_tone: String,
    #[serde(default)]
    pub key_entities: Vec<String>,
    /// Responder ids the classifier thinks should answer.
    #[serde(default)]
    pub suggested_agents: Vec<String>,
    /// Classifier self-reported confidence, 0.0 - 1.0.
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
}

fn default_urgency() -> u8 {
    1
}

impl IntentAnalysis {
    /// Clamp fields into their documented ranges.
    pub fn normalized(mut self) -> Self {
        self.urgency_level = self.urgency_level.clamp(1, 5);
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Whether a responder id is among the suggested agents.
    pub fn suggests(&self, responder_id: &str) -> bool {
        self.suggested_agents.iter().any(|a| a == responder_id)
    }
}

/// External capability that analyzes a message's intent.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a single message.
    async fn classify(&self, message: &str) -> Result<IntentAnalysis, InvocationError>;

    /// Get a human-readable name for this classifier.
    fn name(&self) -> &str;
}
