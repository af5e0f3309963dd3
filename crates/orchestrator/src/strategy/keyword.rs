//! Keyword routing: forced emergency keywords, multi-perspective phrasing,
//! then a per-responder keyword tally.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{ResponderCatalog, EMERGENCY_ID, GENERALIST_ID};
use crate::decision::{DecisionSource, RoutingDecision};

/// Confidence of the generalist when nothing matched.
pub const DEFAULT_CONFIDENCE: f32 = 0.3;

/// Confidence of a multi-perspective parallel panel.
pub const PARALLEL_CONFIDENCE: f32 = 0.9;

/// Maximum panel size for multi-perspective requests.
pub const DEFAULT_PANEL_CAP: usize = 3;

/// Phrases that always go to the emergency responder.
pub const DEFAULT_FORCED_KEYWORDS: &[&str] = &[
    "救急",
    "意識がない",
    "けいれん",
    "呼吸していない",
    "息をしていない",
    "誤飲",
    "窒息",
    "emergency",
    "not breathing",
    "unconscious",
];

/// Phrases asking for several specialists at once.
pub const DEFAULT_PARALLEL_PHRASES: &[&str] = &[
    "いろいろな視点",
    "多角的",
    "総合的に",
    "複数の専門家",
    "みんなの意見",
    "multiple perspectives",
    "different perspectives",
];

/// Map a keyword hit count to a confidence.
pub fn keyword_confidence(hits: usize) -> f32 {
    (0.45 + 0.15 * hits as f32).min(0.95)
}

#[derive(Debug, Clone)]
pub struct KeywordConfig {
    pub forced_keywords: Vec<String>,
    /// Responder that receives forced-keyword messages.
    pub emergency_id: String,
    pub parallel_phrases: Vec<String>,
    pub panel_cap: usize,
    pub generalist_id: String,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            forced_keywords: DEFAULT_FORCED_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            emergency_id: EMERGENCY_ID.to_string(),
            parallel_phrases: DEFAULT_PARALLEL_PHRASES.iter().map(|s| s.to_string()).collect(),
            panel_cap: DEFAULT_PANEL_CAP,
            generalist_id: GENERALIST_ID.to_string(),
        }
    }
}

/// Deterministic keyword strategy.
#[derive(Debug, Clone)]
pub struct KeywordRoutingStrategy {
    catalog: Arc<ResponderCatalog>,
    config: KeywordConfig,
}

impl KeywordRoutingStrategy {
    pub fn new(catalog: Arc<ResponderCatalog>) -> Self {
        Self::with_config(catalog, KeywordConfig::default())
    }

    pub fn with_config(catalog: Arc<ResponderCatalog>, config: KeywordConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &KeywordConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ResponderCatalog> {
        &self.catalog
    }

    /// First configured phrase contained in an already lowercased message.
    fn find_phrase<'a>(phrases: &'a [String], lowered: &str) -> Option<&'a str> {
        phrases
            .iter()
            .find(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
            .map(String::as_str)
    }

    /// The multi-specialist panel used for parallel consultations.
    pub fn panel(&self) -> Vec<String> {
        self.catalog.parallel_panel(
            self.config.panel_cap,
            &[
                self.config.generalist_id.as_str(),
                self.config.emergency_id.as_str(),
            ],
        )
    }

    /// Route a message. The same message always yields the same decision.
    pub fn decide(&self, message: &str) -> RoutingDecision {
        let lowered = message.to_lowercase();

        if let Some(keyword) = Self::find_phrase(&self.config.forced_keywords, &lowered) {
            info!(keyword, responder = %self.config.emergency_id, "ROUTER_FORCED");
            return RoutingDecision::single(
                &self.config.emergency_id,
                1.0,
                format!("forced keyword '{}'", keyword),
                DecisionSource::ForcedKeyword,
            );
        }

        if let Some(phrase) = Self::find_phrase(&self.config.parallel_phrases, &lowered) {
            let panel = self.panel();
            if panel.len() > 1 {
                info!(phrase, panel = ?panel, "ROUTER_PARALLEL");
                return RoutingDecision::parallel(
                    panel,
                    PARALLEL_CONFIDENCE,
                    format!("multi-perspective request '{}'", phrase),
                    DecisionSource::KeywordScore,
                );
            }
            debug!(phrase, "parallel phrasing but panel too small");
        }

        let matches = self.catalog.find_by_keyword(message);
        if let Some((best, hits)) = matches.first() {
            let matched = best.matched_keywords(&lowered);
            debug!(
                candidates = matches.len(),
                responder = %best.id,
                hits,
                "keyword tally"
            );
            return RoutingDecision::single(
                &best.id,
                keyword_confidence(*hits),
                format!("matched keywords: {}", matched.join(", ")),
                DecisionSource::KeywordScore,
            );
        }

        RoutingDecision::single(
            &self.config.generalist_id,
            DEFAULT_CONFIDENCE,
            "no keyword matched",
            DecisionSource::Default,
        )
    }
}
