//! Routing strategies.
//!
//! The set of strategies is closed: [`RoutingStrategy`] is an enum selected
//! by [`StrategyKind`] in configuration.

mod hybrid;
mod keyword;

use std::str::FromStr;

use responder_core::{ConversationTurn, FamilyProfile};
use serde::{Deserialize, Serialize};

use crate::decision::RoutingDecision;
use crate::error::OrchestratorError;

pub use hybrid::{HybridLlmRoutingStrategy, HybridWeights};
pub use keyword::{
    keyword_confidence, KeywordConfig, KeywordRoutingStrategy, DEFAULT_CONFIDENCE,
    DEFAULT_FORCED_KEYWORDS, DEFAULT_PANEL_CAP, DEFAULT_PARALLEL_PHRASES, PARALLEL_CONFIDENCE,
};

/// Which strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Keyword,
    Hybrid,
}

impl FromStr for StrategyKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "keywords" => Ok(Self::Keyword),
            "hybrid" | "hybrid_llm" | "llm" => Ok(Self::Hybrid),
            other => Err(OrchestratorError::Configuration(format!(
                "unknown routing strategy '{}'",
                other
            ))),
        }
    }
}

/// A configured routing strategy.
#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    Keyword(KeywordRoutingStrategy),
    Hybrid(HybridLlmRoutingStrategy),
}

impl RoutingStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Keyword(_) => StrategyKind::Keyword,
            Self::Hybrid(_) => StrategyKind::Hybrid,
        }
    }

    /// Produce exactly one routing decision.
    ///
    /// History and profile are accepted for strategies that weigh them; the
    /// current strategies route on the message alone.
    pub async fn decide(
        &self,
        message: &str,
        _history: &[ConversationTurn],
        _profile: Option<&FamilyProfile>,
    ) -> RoutingDecision {
        match self {
            Self::Keyword(strategy) => strategy.decide(message),
            Self::Hybrid(strategy) => strategy.decide(message).await,
        }
    }

    /// The keyword strategy underlying either variant.
    pub fn keyword(&self) -> &KeywordRoutingStrategy {
        match self {
            Self::Keyword(strategy) => strategy,
            Self::Hybrid(strategy) => strategy.keyword(),
        }
    }
}
