//! Main orchestrator that coordinates request handling.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use responder_core::{prompt_fingerprint, IntentClassifier, Responder};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::ResponderCatalog;
use crate::config::OrchestratorConfig;
use crate::context::ContextBuilder;
use crate::decision::{DecisionSource, RoutingDecision};
use crate::error::OrchestratorError;
use crate::executor::RoutingExecutor;
use crate::followups::{FollowUpGenerator, FollowUps};
use crate::quality::QualityChecker;
use crate::registry::ResponderSet;
use crate::request::{
    Diagnostics, FallbackTier, FollowUpSource, OrchestrationResult, Request, RequestMode,
};
use crate::strategy::{
    HybridLlmRoutingStrategy, KeywordConfig, KeywordRoutingStrategy, RoutingStrategy,
    StrategyKind, DEFAULT_CONFIDENCE, PARALLEL_CONFIDENCE,
};

/// Main orchestrator that coordinates request handling.
///
/// The orchestrator:
/// - Builds an enriched prompt from the message, history and family profile
/// - Routes the request with the configured strategy, or the caller's mode
/// - Executes the decision with retries, cross-routing and fallback
/// - Separates follow-up questions from the answer, generating them if needed
///
/// All state is immutable after construction; share one instance across
/// requests.
#[derive(Debug)]
pub struct Orchestrator {
    catalog: Arc<ResponderCatalog>,
    context: ContextBuilder,
    strategy: RoutingStrategy,
    executor: RoutingExecutor,
    follow_ups: FollowUpGenerator,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Create an orchestrator from `ORCHESTRATOR_*` environment variables.
    ///
    /// The catalog comes from `ORCHESTRATOR_CATALOG_FILE` when set, otherwise
    /// the built-in childcare catalog is used.
    pub fn from_env(
        responders: ResponderSet,
        classifier: Option<Arc<dyn IntentClassifier>>,
    ) -> Result<Self, OrchestratorError> {
        let mut builder = OrchestratorBuilder::new()
            .config(OrchestratorConfig::from_env()?)
            .responders(responders);
        if let Some(classifier) = classifier {
            builder = builder.classifier(classifier);
        }
        builder.build()
    }

    pub fn catalog(&self) -> &Arc<ResponderCatalog> {
        &self.catalog
    }

    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    pub fn context_builder(&self) -> &ContextBuilder {
        &self.context
    }

    /// Handle one request end-to-end.
    ///
    /// Never fails: when no responder produces an acceptable answer the
    /// result carries the static apology.
    pub async fn handle(&self, request: Request) -> OrchestrationResult {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "orchestrate",
            %request_id,
            user_id = %request.user_id,
            session_id = %request.session_id
        );
        self.handle_inner(request_id, request).instrument(span).await
    }

    async fn handle_inner(&self, request_id: Uuid, request: Request) -> OrchestrationResult {
        let started = Instant::now();
        info!(mode = ?request.mode, history = request.history.len(), "Handling request");

        // 1. Build the enriched prompt
        let prompt = self
            .context
            .build_prompt(&request.message, &request.history, request.profile.as_ref());
        let fingerprint = prompt_fingerprint(&prompt);
        debug!(prompt_fingerprint = %fingerprint, chars = prompt.chars().count(), "prompt built");

        // 2. Decide who answers
        let decision = self.decide(&request).await;
        info!(
            decision = %decision.description(),
            reasoning = %decision.reasoning,
            "ROUTING_DECISION"
        );

        // 3. Execute
        let session = request.session_context();
        let execution = self
            .executor
            .execute(&decision, &prompt, &request.message, &session)
            .await;
        let mut answer_is_apology = execution.fallback == Some(FallbackTier::StaticApology);

        // 4. Separate follow-ups from the answer
        let extraction = if answer_is_apology {
            None
        } else {
            Some(self.context.extract_follow_ups(&execution.text))
        };
        let (mut final_text, embedded) = match extraction {
            Some(extraction) => (extraction.clean_text, extraction.questions),
            None => (execution.text.clone(), Vec::new()),
        };

        if final_text.trim().is_empty() {
            warn!("answer empty after cleanup, using apology");
            final_text = self.executor.config().apology.clone();
            answer_is_apology = true;
        }

        // 5. Generate follow-ups when none were embedded
        let follow_ups = if !embedded.is_empty() {
            FollowUps {
                questions: embedded,
                source: FollowUpSource::Embedded,
            }
        } else if answer_is_apology {
            FollowUps {
                questions: Vec::new(),
                source: FollowUpSource::None,
            }
        } else {
            self.follow_ups
                .generate(&request.message, &final_text, &session)
                .await
        };

        let total_latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            path = ?execution.routing_path,
            follow_ups = follow_ups.questions.len(),
            follow_up_source = ?follow_ups.source,
            total_latency_ms,
            "REQUEST_DONE"
        );

        OrchestrationResult {
            final_text,
            follow_up_questions: follow_ups.questions,
            routing_path: execution.routing_path,
            diagnostics: Diagnostics {
                request_id,
                decision,
                corrections: execution.corrections,
                attempts: execution.attempts,
                cross_route: execution.cross_route,
                fallback: execution.fallback,
                stages: execution.stages,
                follow_up_source: follow_ups.source,
                prompt_fingerprint: fingerprint,
                total_latency_ms,
            },
        }
    }

    async fn decide(&self, request: &Request) -> RoutingDecision {
        match &request.mode {
            RequestMode::Auto => {
                self.strategy
                    .decide(&request.message, &request.history, request.profile.as_ref())
                    .await
            }
            RequestMode::Forced(id) => RoutingDecision::single(
                id,
                1.0,
                format!("caller requested '{}'", id),
                DecisionSource::Explicit,
            ),
            RequestMode::Parallel => {
                let panel = self.strategy.keyword().panel();
                if panel.is_empty() {
                    RoutingDecision::single(
                        &self.executor.config().generalist_id,
                        DEFAULT_CONFIDENCE,
                        "caller requested a panel but none is available",
                        DecisionSource::Explicit,
                    )
                } else {
                    RoutingDecision::parallel(
                        panel,
                        PARALLEL_CONFIDENCE,
                        "caller requested a panel",
                        DecisionSource::Explicit,
                    )
                }
            }
        }
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    catalog: Option<Arc<ResponderCatalog>>,
    responders: ResponderSet,
    classifier: Option<Arc<dyn IntentClassifier>>,
    reference_date: Option<NaiveDate>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            catalog: None,
            responders: ResponderSet::new(),
            classifier: None,
            reference_date: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this catalog instead of loading one from configuration.
    pub fn catalog(mut self, catalog: impl Into<Arc<ResponderCatalog>>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn responders(mut self, responders: ResponderSet) -> Self {
        self.responders = responders;
        self
    }

    /// Register one responder implementation.
    pub fn responder<R: Responder + 'static>(
        mut self,
        id: impl Into<String>,
        responder: R,
    ) -> Self {
        self.responders.register(id, responder);
        self
    }

    /// Register one shared responder implementation.
    pub fn responder_arc(mut self, id: impl Into<String>, responder: Arc<dyn Responder>) -> Self {
        self.responders.register_arc(id, responder);
        self
    }

    /// Intent classifier for the hybrid strategy.
    pub fn classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Fix the date ages are computed against.
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let config = self.config;

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => Arc::new(ResponderCatalog::load(config.catalog_file.as_deref())?),
        };

        let generalist_id = &config.executor.generalist_id;
        if !catalog.contains(generalist_id) {
            return Err(OrchestratorError::Configuration(format!(
                "generalist '{}' is not in the catalog",
                generalist_id
            )));
        }

        for id in catalog.ids() {
            if !self.responders.contains(id) {
                warn!("No responder registered for catalog entry '{}'", id);
            }
        }

        let keyword = KeywordRoutingStrategy::with_config(
            Arc::clone(&catalog),
            KeywordConfig {
                generalist_id: generalist_id.clone(),
                ..KeywordConfig::default()
            },
        );

        let strategy = match config.strategy {
            StrategyKind::Keyword => RoutingStrategy::Keyword(keyword),
            StrategyKind::Hybrid => {
                let classifier = self.classifier.ok_or_else(|| {
                    OrchestratorError::Configuration(
                        "hybrid routing requires an intent classifier".to_string(),
                    )
                })?;
                RoutingStrategy::Hybrid(
                    HybridLlmRoutingStrategy::new(keyword, classifier)
                        .with_weights(config.hybrid_weights)
                        .with_classify_timeout(config.classify_timeout),
                )
            }
        };

        let follow_ups = match &config.follow_up_responder {
            Some(id) => {
                let responder = self.responders.get(id).cloned().ok_or_else(|| {
                    OrchestratorError::Configuration(format!(
                        "follow-up responder '{}' is not registered",
                        id
                    ))
                })?;
                FollowUpGenerator::new(responder)
            }
            None => FollowUpGenerator::static_only(),
        }
        .with_timeout(config.follow_up_timeout)
        .with_marker(config.follow_up_marker.clone());

        let mut context = ContextBuilder::new()
            .with_history_limits(config.max_history_turns, config.max_turn_chars)
            .with_follow_up_marker(config.follow_up_marker.clone());
        if let Some(date) = self.reference_date {
            context = context.with_reference_date(date);
        }

        let mut quality = QualityChecker::new(config.min_response_chars);
        if !config.check_relevance {
            quality = quality.without_relevance();
        }

        info!(
            "Orchestrator ready: {} responders in catalog, {} registered, strategy {:?}",
            catalog.len(),
            self.responders.len(),
            strategy.kind()
        );

        let executor = RoutingExecutor::new(
            Arc::clone(&catalog),
            Arc::new(self.responders),
            quality,
            config.executor,
        )
        .with_follow_up_marker(config.follow_up_marker);

        Ok(Orchestrator {
            catalog,
            context,
            strategy,
            executor,
            follow_ups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ResponderDescriptor, GENERALIST_ID};
    use mock_responder::{FixedClassifier, StaticResponder};

    #[test]
    fn test_hybrid_requires_classifier() {
        let config = OrchestratorConfig {
            strategy: StrategyKind::Hybrid,
            ..OrchestratorConfig::default()
        };
        let result = Orchestrator::builder().config(config).build();
        assert!(matches!(result, Err(OrchestratorError::Configuration(_))));
    }

    #[test]
    fn test_hybrid_with_classifier() {
        let config = OrchestratorConfig {
            strategy: StrategyKind::Hybrid,
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::builder()
            .config(config)
            .classifier(Arc::new(FixedClassifier::suggesting(["sleep"], 0.9, 2)))
            .build()
            .unwrap();
        assert_eq!(orchestrator.strategy().kind(), StrategyKind::Hybrid);
    }

    #[test]
    fn test_generalist_must_exist() {
        let catalog =
            ResponderCatalog::new(vec![ResponderDescriptor::new("sleep", "Sleep", "sleep", 1)])
                .unwrap();
        let result = Orchestrator::builder().catalog(catalog).build();
        assert!(matches!(
            result,
            Err(OrchestratorError::Configuration(msg)) if msg.contains(GENERALIST_ID)
        ));
    }

    #[test]
    fn test_follow_up_responder_must_be_registered() {
        let config = OrchestratorConfig {
            follow_up_responder: Some("followups".to_string()),
            ..OrchestratorConfig::default()
        };
        let result = Orchestrator::builder().config(config.clone()).build();
        assert!(matches!(result, Err(OrchestratorError::Configuration(_))));

        let result = Orchestrator::builder()
            .config(config)
            .responder("followups", StaticResponder::new("f", "💭 質問"))
            .build();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_forced_mode_is_explicit() {
        let orchestrator = Orchestrator::builder()
            .responder(
                "sleep",
                StaticResponder::new("sleep", "夜泣きには寝る前のルーティンが効果的です。"),
            )
            .build()
            .unwrap();

        let request =
            Request::new("夜泣き", "u", "s").with_mode(RequestMode::Forced("sleep".into()));
        let decision = orchestrator.decide(&request).await;
        assert_eq!(decision.primary_id(), Some("sleep"));
        assert_eq!(decision.source, DecisionSource::Explicit);
        assert_eq!(decision.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_parallel_mode_uses_panel() {
        let orchestrator = Orchestrator::builder().build().unwrap();
        let request = Request::new("相談", "u", "s").with_mode(RequestMode::Parallel);
        let decision = orchestrator.decide(&request).await;
        assert_eq!(decision.target.ids(), vec!["health", "sleep", "nutrition"]);
        assert_eq!(decision.source, DecisionSource::Explicit);
    }
}
