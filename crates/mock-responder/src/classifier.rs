//! Fixed intent classifier for hybrid routing tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use responder_core::{async_trait, IntentAnalysis, IntentClassifier, InvocationError};

/// A classifier that returns the same analysis (or error) for every message.
pub struct FixedClassifier {
    outcome: Result<IntentAnalysis, InvocationError>,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(analysis: IntentAnalysis) -> Self {
        Self {
            outcome: Ok(analysis),
            calls: AtomicUsize::new(0),
        }
    }

    /// Classifier that always fails with `error`.
    pub fn failing(error: InvocationError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Convenience constructor for the common "suggest these agents" case.
    pub fn suggesting<I, S>(agents: I, confidence: f32, urgency_level: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(IntentAnalysis {
            intent_type: "question".to_string(),
            urgency_level,
            emotion_tone: "neutral".to_string(),
            key_entities: Vec::new(),
            suggested_agents: agents.into_iter().map(Into::into).collect(),
            confidence,
            reasoning: "fixed classifier".to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _message: &str) -> Result<IntentAnalysis, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn name(&self) -> &str {
        "FixedClassifier"
    }
}
