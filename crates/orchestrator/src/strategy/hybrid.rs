//! Hybrid routing: keyword tally combined with LLM intent analysis.

use std::sync::Arc;
use std::time::Duration;

use responder_core::{IntentAnalysis, IntentClassifier};
use tracing::{debug, info, warn};

use super::keyword::{KeywordRoutingStrategy, DEFAULT_CONFIDENCE};
use crate::catalog::ResponderDescriptor;
use crate::decision::{DecisionSource, RoutingDecision};
use crate::error::OrchestratorError;

/// Keyword hits beyond this count do not raise the normalizing ceiling.
const MAX_COUNTED_HITS: f32 = 3.0;

/// Score weights for hybrid routing.
///
/// `score = keyword_hit * hits
///        + suggested_agent * llm_confidence * [suggested]
///        + urgency * [urgency >= urgent_threshold && handles_urgent]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub keyword_hit: f32,
    pub suggested_agent: f32,
    pub urgency: f32,
    pub urgent_threshold: u8,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            keyword_hit: 10.0,
            suggested_agent: 20.0,
            urgency: 10.0,
            urgent_threshold: 4,
        }
    }
}

impl HybridWeights {
    /// Largest score a typical responder can reach; used to normalize.
    pub fn ceiling(&self) -> f32 {
        MAX_COUNTED_HITS * self.keyword_hit + self.suggested_agent + self.urgency
    }

    /// Score one responder.
    pub fn score(
        &self,
        descriptor: &ResponderDescriptor,
        hits: usize,
        analysis: &IntentAnalysis,
    ) -> f32 {
        let mut score = self.keyword_hit * hits as f32;
        if analysis.suggests(&descriptor.id) {
            score += self.suggested_agent * analysis.confidence;
        }
        if analysis.urgency_level >= self.urgent_threshold && descriptor.handles_urgent {
            score += self.urgency;
        }
        score
    }
}

/// Combines keyword hits with an external classifier's intent analysis.
///
/// When the classifier fails or times out, the keyword strategy decides.
#[derive(Clone)]
pub struct HybridLlmRoutingStrategy {
    keyword: KeywordRoutingStrategy,
    classifier: Arc<dyn IntentClassifier>,
    weights: HybridWeights,
    classify_timeout: Duration,
}

impl HybridLlmRoutingStrategy {
    /// Default time allowed for intent classification.
    pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(keyword: KeywordRoutingStrategy, classifier: Arc<dyn IntentClassifier>) -> Self {
        Self {
            keyword,
            classifier,
            weights: HybridWeights::default(),
            classify_timeout: Self::DEFAULT_CLASSIFY_TIMEOUT,
        }
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub fn weights(&self) -> &HybridWeights {
        &self.weights
    }

    /// The keyword strategy used for scoring and as the fallback.
    pub fn keyword(&self) -> &KeywordRoutingStrategy {
        &self.keyword
    }

    pub async fn decide(&self, message: &str) -> RoutingDecision {
        match self.analyze(message).await {
            Ok(analysis) => self.score(message, &analysis),
            Err(e) => {
                warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "using keyword routing"
                );
                self.keyword.decide(message)
            }
        }
    }

    /// Run the classifier under the classification timeout.
    pub async fn analyze(&self, message: &str) -> Result<IntentAnalysis, OrchestratorError> {
        let classify = self.classifier.classify(message);
        match tokio::time::timeout(self.classify_timeout, classify).await {
            Ok(Ok(analysis)) => Ok(analysis.normalized()),
            Ok(Err(e)) => Err(OrchestratorError::Classification(e.to_string())),
            Err(_) => Err(OrchestratorError::Classification(format!(
                "no answer within {:?}",
                self.classify_timeout
            ))),
        }
    }

    /// Pick the best responder for a message given its analysis.
    pub fn score(&self, message: &str, analysis: &IntentAnalysis) -> RoutingDecision {
        let lowered = message.to_lowercase();
        let mut best: Option<(&ResponderDescriptor, f32, usize)> = None;

        // Catalog order is (rank, id); strict > keeps the earlier entry on ties.
        for descriptor in self.keyword.catalog().all() {
            let hits = descriptor.keyword_hits(&lowered);
            let score = self.weights.score(descriptor, hits, analysis);
            debug!(responder = %descriptor.id, hits, score, "hybrid score");

            if score > best.map_or(0.0, |(_, s, _)| s) {
                best = Some((descriptor, score, hits));
            }
        }

        let Some((descriptor, score, hits)) = best else {
            return RoutingDecision::single(
                &self.keyword.config().generalist_id,
                DEFAULT_CONFIDENCE,
                "no responder scored above zero",
                DecisionSource::Default,
            );
        };

        let confidence = (score / self.weights.ceiling()).min(1.0);
        info!(
            responder = %descriptor.id,
            score,
            confidence,
            urgency = analysis.urgency_level,
            "ROUTER_HYBRID"
        );

        RoutingDecision::single(
            &descriptor.id,
            confidence,
            format!(
                "score {:.1} (keyword hits {}, suggested {}, urgency {}){}",
                score,
                hits,
                analysis.suggests(&descriptor.id),
                analysis.urgency_level,
                if analysis.reasoning.is_empty() {
                    String::new()
                } else {
                    format!(": {}", analysis.reasoning)
                }
            ),
            DecisionSource::HybridLlm,
        )
    }
}

impl std::fmt::Debug for HybridLlmRoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridLlmRoutingStrategy")
            .field("classifier", &self.classifier.name())
            .field("weights", &self.weights)
            .field("classify_timeout", &self.classify_timeout)
            .finish()
    }
}
