//! Orchestrator configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::context::{DEFAULT_MAX_HISTORY_TURNS, DEFAULT_MAX_TURN_CHARS};
use crate::error::OrchestratorError;
use crate::executor::{CrossRouteMode, ExecutorConfig};
use crate::followups::{FollowUpGenerator, DEFAULT_FOLLOW_UP_MARKER};
use crate::quality::DEFAULT_MIN_RESPONSE_CHARS;
use crate::strategy::{HybridLlmRoutingStrategy, HybridWeights, StrategyKind};

/// Configuration for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub strategy: StrategyKind,
    pub executor: ExecutorConfig,
    pub min_response_chars: usize,
    pub check_relevance: bool,
    /// JSON catalog to load instead of the built-in one.
    pub catalog_file: Option<PathBuf>,
    /// Responder id used to generate follow-up questions.
    pub follow_up_responder: Option<String>,
    pub follow_up_timeout: Duration,
    pub follow_up_marker: String,
    pub hybrid_weights: HybridWeights,
    pub classify_timeout: Duration,
    pub max_history_turns: usize,
    pub max_turn_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            executor: ExecutorConfig::default(),
            min_response_chars: DEFAULT_MIN_RESPONSE_CHARS,
            check_relevance: true,
            catalog_file: None,
            follow_up_responder: None,
            follow_up_timeout: FollowUpGenerator::DEFAULT_TIMEOUT,
            follow_up_marker: DEFAULT_FOLLOW_UP_MARKER.to_string(),
            hybrid_weights: HybridWeights::default(),
            classify_timeout: HybridLlmRoutingStrategy::DEFAULT_CLASSIFY_TIMEOUT,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            max_turn_chars: DEFAULT_MAX_TURN_CHARS,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn secs_var(name: &str) -> Option<Duration> {
    parse_var::<u64>(name).map(Duration::from_secs)
}

fn bool_var(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl OrchestratorConfig {
    /// Create configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `ORCHESTRATOR_STRATEGY` - `keyword` or `hybrid` (default: keyword)
    /// - `ORCHESTRATOR_MAX_RETRIES` - Retries per responder (default: 2)
    /// - `ORCHESTRATOR_ATTEMPT_TIMEOUT_SECS` - Per-attempt timeout (default: 30)
    /// - `ORCHESTRATOR_PARALLEL_DEADLINE_SECS` - Parallel consultation deadline (default: 20)
    /// - `ORCHESTRATOR_REQUEST_DEADLINE_SECS` - Whole-request deadline (default: 60)
    /// - `ORCHESTRATOR_RETRY_DELAY_MS` - Pause between attempts (default: 250)
    /// - `ORCHESTRATOR_MIN_RESPONSE_CHARS` - Minimum answer length (default: 10)
    /// - `ORCHESTRATOR_CHECK_RELEVANCE` - Off-topic check (default: true)
    /// - `ORCHESTRATOR_GENERALIST` - Generalist responder id (default: generalist)
    /// - `ORCHESTRATOR_CROSS_ROUTE` - Follow referrals (default: true)
    /// - `ORCHESTRATOR_CROSS_ROUTE_MODE` - `append` or `replace` (default: append)
    /// - `ORCHESTRATOR_APOLOGY` - Static fallback text
    /// - `ORCHESTRATOR_CATALOG_FILE` - JSON responder catalog
    /// - `ORCHESTRATOR_FOLLOW_UP_RESPONDER` - Responder id for follow-up generation
    /// - `ORCHESTRATOR_FOLLOW_UP_TIMEOUT_SECS` - Follow-up generation timeout (default: 10)
    /// - `ORCHESTRATOR_FOLLOW_UP_MARKER` - Follow-up marker (default: 💭)
    /// - `ORCHESTRATOR_KEYWORD_WEIGHT`, `ORCHESTRATOR_SUGGESTION_WEIGHT`,
    ///   `ORCHESTRATOR_URGENCY_WEIGHT`, `ORCHESTRATOR_URGENT_THRESHOLD` - Hybrid weights
    /// - `ORCHESTRATOR_CLASSIFY_TIMEOUT_SECS` - Intent classification timeout (default: 15)
    /// - `ORCHESTRATOR_MAX_HISTORY_TURNS` - History turns in prompts (default: 10)
    /// - `ORCHESTRATOR_MAX_TURN_CHARS` - Per-turn character limit (default: 500)
    ///
    /// Unparseable numbers fall back to their defaults; an unknown strategy
    /// or cross-route mode is a configuration error.
    pub fn from_env() -> Result<Self, OrchestratorError> {
        let defaults = Self::default();

        let strategy = match string_var("ORCHESTRATOR_STRATEGY") {
            Some(s) => s.parse()?,
            None => defaults.strategy,
        };

        let cross_route_mode = match string_var("ORCHESTRATOR_CROSS_ROUTE_MODE") {
            Some(s) => match s.trim().to_lowercase().as_str() {
                "append" => CrossRouteMode::Append,
                "replace" => CrossRouteMode::Replace,
                other => {
                    return Err(OrchestratorError::Configuration(format!(
                        "unknown cross-route mode '{}'",
                        other
                    )))
                }
            },
            None => defaults.executor.cross_route_mode,
        };

        let executor = ExecutorConfig {
            max_retries: parse_var("ORCHESTRATOR_MAX_RETRIES")
                .unwrap_or(defaults.executor.max_retries),
            attempt_timeout: secs_var("ORCHESTRATOR_ATTEMPT_TIMEOUT_SECS")
                .unwrap_or(defaults.executor.attempt_timeout),
            parallel_deadline: secs_var("ORCHESTRATOR_PARALLEL_DEADLINE_SECS")
                .unwrap_or(defaults.executor.parallel_deadline),
            request_deadline: secs_var("ORCHESTRATOR_REQUEST_DEADLINE_SECS")
                .unwrap_or(defaults.executor.request_deadline),
            retry_delay: parse_var::<u64>("ORCHESTRATOR_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.executor.retry_delay),
            generalist_id: string_var("ORCHESTRATOR_GENERALIST")
                .unwrap_or(defaults.executor.generalist_id),
            cross_route: bool_var("ORCHESTRATOR_CROSS_ROUTE")
                .unwrap_or(defaults.executor.cross_route),
            cross_route_mode,
            apology: string_var("ORCHESTRATOR_APOLOGY").unwrap_or(defaults.executor.apology),
        };

        let hybrid_weights = HybridWeights {
            keyword_hit: parse_var("ORCHESTRATOR_KEYWORD_WEIGHT")
                .unwrap_or(defaults.hybrid_weights.keyword_hit),
            suggested_agent: parse_var("ORCHESTRATOR_SUGGESTION_WEIGHT")
                .unwrap_or(defaults.hybrid_weights.suggested_agent),
            urgency: parse_var("ORCHESTRATOR_URGENCY_WEIGHT")
                .unwrap_or(defaults.hybrid_weights.urgency),
            urgent_threshold: parse_var("ORCHESTRATOR_URGENT_THRESHOLD")
                .unwrap_or(defaults.hybrid_weights.urgent_threshold),
        };

        Ok(Self {
            strategy,
            executor,
            min_response_chars: parse_var("ORCHESTRATOR_MIN_RESPONSE_CHARS")
                .unwrap_or(defaults.min_response_chars),
            check_relevance: bool_var("ORCHESTRATOR_CHECK_RELEVANCE")
                .unwrap_or(defaults.check_relevance),
            catalog_file: string_var("ORCHESTRATOR_CATALOG_FILE").map(PathBuf::from),
            follow_up_responder: string_var("ORCHESTRATOR_FOLLOW_UP_RESPONDER"),
            follow_up_timeout: secs_var("ORCHESTRATOR_FOLLOW_UP_TIMEOUT_SECS")
                .unwrap_or(defaults.follow_up_timeout),
            follow_up_marker: string_var("ORCHESTRATOR_FOLLOW_UP_MARKER")
                .unwrap_or(defaults.follow_up_marker),
            hybrid_weights,
            classify_timeout: secs_var("ORCHESTRATOR_CLASSIFY_TIMEOUT_SECS")
                .unwrap_or(defaults.classify_timeout),
            max_history_turns: parse_var("ORCHESTRATOR_MAX_HISTORY_TURNS")
                .unwrap_or(defaults.max_history_turns),
            max_turn_chars: parse_var("ORCHESTRATOR_MAX_TURN_CHARS")
                .unwrap_or(defaults.max_turn_chars),
        })
    }
}

/// Serializes tests that touch process-global environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
