//! Routing executor: invokes responders, validates answers, retries,
//! cross-routes, falls back and aggregates parallel consultations.
//!
//! ```text
//! SELECT ─► VALIDATE ─► EXECUTE ─► QUALITY_CHECK ─┬─► DONE
//!                          ▲                      ├─► RETRY ──┐
//!                          └──────────────────────┼───────────┘
//!                                                 ├─► CROSS_ROUTE ─► DONE
//!                                                 └─► FALLBACK ─► DONE
//! ```
//!
//! Every attempt is bounded by the per-attempt timeout and the request
//! deadline. Parallel consultations spawn one task per responder and share a
//! single deadline; tasks still running past it are aborted.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use responder_core::{InvocationError, SessionContext};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::catalog::{ResponderCatalog, GENERALIST_ID};
use crate::decision::{RoutingDecision, RoutingTarget};
use crate::error::OrchestratorError;
use crate::followups::{extract_follow_ups_with, DEFAULT_FOLLOW_UP_MARKER};
use crate::quality::QualityChecker;
use crate::registry::ResponderSet;
use crate::request::{
    CrossRoute, FailureKind, FallbackTier, ResponderResult, Stage, STATIC_FALLBACK_MARKER,
};

/// Default apology returned when no responder could answer.
pub const DEFAULT_APOLOGY: &str = "申し訳ありません。ただいまご質問にうまくお答えできませんでした。\
言い方を変えてもう一度お送りいただくか、心配な症状がある場合はかかりつけの小児科医などの専門家にご相談ください。";

/// Extra time a parallel task gets past the shared deadline to report its
/// own timeout before it is aborted.
const JOIN_GRACE: Duration = Duration::from_millis(50);

/// How a cross-routed answer is combined with the primary answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossRouteMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Additional attempts after the first, per responder.
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    /// Shared deadline for a parallel consultation.
    pub parallel_deadline: Duration,
    /// Bound on the whole execution.
    pub request_deadline: Duration,
    /// Pause between attempts on the same responder.
    pub retry_delay: Duration,
    pub generalist_id: String,
    pub cross_route: bool,
    pub cross_route_mode: CrossRouteMode,
    pub apology: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            attempt_timeout: Duration::from_secs(30),
            parallel_deadline: Duration::from_secs(20),
            request_deadline: Duration::from_secs(60),
            retry_delay: Duration::from_millis(250),
            generalist_id: GENERALIST_ID.to_string(),
            cross_route: true,
            cross_route_mode: CrossRouteMode::Append,
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Maximum attempts on a single responder.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Everything the executor did for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Final answer before follow-up extraction; never empty.
    pub text: String,
    pub routing_path: Vec<String>,
    pub attempts: Vec<ResponderResult>,
    pub corrections: Vec<String>,
    pub cross_route: Option<CrossRoute>,
    pub fallback: Option<FallbackTier>,
    pub stages: Vec<Stage>,
}

impl Execution {
    fn new() -> Self {
        Self {
            text: String::new(),
            routing_path: Vec::new(),
            attempts: Vec::new(),
            corrections: Vec::new(),
            cross_route: None,
            fallback: None,
            stages: vec![Stage::Select],
        }
    }

    fn visited(&self, id: &str) -> bool {
        self.routing_path.iter().any(|p| p == id)
    }
}

/// Per-request inputs shared by every attempt, cheap to clone into tasks.
#[derive(Clone)]
struct AttemptContext {
    catalog: Arc<ResponderCatalog>,
    responders: Arc<ResponderSet>,
    quality: QualityChecker,
    prompt: Arc<str>,
    message: Arc<str>,
    session: Arc<SessionContext>,
    max_attempts: u32,
    attempt_timeout: Duration,
    retry_delay: Duration,
}

/// Attempts made on one responder.
struct AttemptOutcome {
    responder_id: String,
    results: Vec<ResponderResult>,
    stages: Vec<Stage>,
    answer: Result<String, OrchestratorError>,
}

impl AttemptOutcome {
    fn lost(responder_id: String, error: FailureKind) -> Self {
        Self {
            results: vec![ResponderResult::failed(&responder_id, 1, error, 0)],
            stages: Vec::new(),
            answer: Err(OrchestratorError::ExhaustedRetries {
                responder_id: responder_id.clone(),
                attempts: 1,
            }),
            responder_id,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Invoke one responder up to `max_attempts` times, sequentially.
///
/// Each attempt is bounded by `min(deadline, now + attempt_timeout)`. Once
/// the deadline has passed no further attempts are made. An answer that only
/// failed a soft check (off-topic) is retried, and used if no attempt does
/// better.
async fn attempt_loop(
    ctx: &AttemptContext,
    responder_id: &str,
    deadline: Instant,
) -> AttemptOutcome {
    let mut results = Vec::new();
    let mut stages = Vec::new();
    let mut soft_answer: Option<(u32, String)> = None;
    let keywords: Vec<&str> = ctx
        .catalog
        .get(responder_id)
        .map(|d| d.keywords.iter().map(String::as_str).collect())
        .unwrap_or_default();

    for attempt in 1..=ctx.max_attempts {
        if attempt > 1 {
            stages.push(Stage::Retry);
            warn!(responder = responder_id, attempt, "RESPONDER_RETRY");
            if !ctx.retry_delay.is_zero() {
                sleep_until((Instant::now() + ctx.retry_delay).min(deadline)).await;
            }
        }

        stages.push(Stage::Execute);
        let started = Instant::now();
        if started >= deadline {
            warn!(responder = responder_id, attempt, "request deadline reached");
            results.push(ResponderResult::failed(
                responder_id,
                attempt,
                FailureKind::Timeout,
                0,
            ));
            break;
        }

        let bound = (started + ctx.attempt_timeout).min(deadline);
        let outcome = timeout_at(
            bound,
            ctx.responders.invoke(responder_id, &ctx.prompt, &ctx.session),
        )
        .await;
        let latency_ms = elapsed_ms(started);

        let failure = match outcome {
            Ok(Ok(text)) => {
                trace!(responder = responder_id, attempt, response = %text, "raw responder output");
                stages.push(Stage::QualityCheck);
                match ctx
                    .quality
                    .check_with_keywords(&ctx.message, &text, keywords.iter().copied())
                {
                    Ok(()) => {
                        info!(responder = responder_id, attempt, latency_ms, "RESPONDER_OK");
                        results.push(ResponderResult::succeeded(
                            responder_id,
                            attempt,
                            text.clone(),
                            latency_ms,
                        ));
                        return AttemptOutcome {
                            responder_id: responder_id.to_string(),
                            results,
                            stages,
                            answer: Ok(text),
                        };
                    }
                    Err(issue) => {
                        if issue.is_soft() {
                            soft_answer = Some((attempt, text));
                        }
                        FailureKind::Quality(issue)
                    }
                }
            }
            Ok(Err(InvocationError::Unavailable(msg))) => FailureKind::Unavailable(msg),
            Ok(Err(InvocationError::Timeout)) | Err(_) => FailureKind::Timeout,
            Ok(Err(e)) => FailureKind::Invocation(e.to_string()),
        };

        warn!(
            responder = responder_id,
            attempt,
            latency_ms,
            error = %OrchestratorError::from(failure.clone()),
            "RESPONDER_FAILED"
        );
        results.push(ResponderResult::failed(responder_id, attempt, failure, latency_ms));
    }

    if let Some((attempt, text)) = soft_answer {
        info!(responder = responder_id, attempt, "RESPONDER_ACCEPTED_OFF_TOPIC");
        return AttemptOutcome {
            responder_id: responder_id.to_string(),
            results,
            stages,
            answer: Ok(text),
        };
    }

    let attempts = u32::try_from(results.len()).unwrap_or(u32::MAX);
    AttemptOutcome {
        responder_id: responder_id.to_string(),
        results,
        stages,
        answer: Err(OrchestratorError::ExhaustedRetries {
            responder_id: responder_id.to_string(),
            attempts,
        }),
    }
}

/// Executes routing decisions.
///
/// Holds only immutable, shared state; one executor serves all requests.
#[derive(Debug, Clone)]
pub struct RoutingExecutor {
    catalog: Arc<ResponderCatalog>,
    responders: Arc<ResponderSet>,
    quality: QualityChecker,
    config: ExecutorConfig,
    follow_up_marker: String,
}

impl RoutingExecutor {
    pub fn new(
        catalog: Arc<ResponderCatalog>,
        responders: Arc<ResponderSet>,
        quality: QualityChecker,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            catalog,
            responders,
            quality,
            config,
            follow_up_marker: DEFAULT_FOLLOW_UP_MARKER.to_string(),
        }
    }

    /// Marker of follow-up questions, which referral detection ignores.
    pub fn with_follow_up_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() {
            self.follow_up_marker = marker;
        }
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ResponderCatalog> {
        &self.catalog
    }

    /// Run a decision to completion. Never fails; the worst outcome is the
    /// static apology.
    pub async fn execute(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
        message: &str,
        session: &SessionContext,
    ) -> Execution {
        let deadline = Instant::now() + self.config.request_deadline;
        let ctx = AttemptContext {
            catalog: Arc::clone(&self.catalog),
            responders: Arc::clone(&self.responders),
            quality: self.quality.clone(),
            prompt: Arc::from(prompt),
            message: Arc::from(message),
            session: Arc::new(session.clone()),
            max_attempts: self.config.max_attempts(),
            attempt_timeout: self.config.attempt_timeout,
            retry_delay: self.config.retry_delay,
        };

        let mut execution = Execution::new();
        execution.stages.push(Stage::Validate);
        let target = self.validate(
            &decision.target,
            session.has_media(),
            &mut execution.corrections,
        );

        match target {
            RoutingTarget::Single(id) => {
                self.run_single(&ctx, &id, deadline, &mut execution).await
            }
            RoutingTarget::Parallel(ids) => {
                self.run_parallel(&ctx, &ids, deadline, &mut execution).await
            }
        }

        execution.stages.push(Stage::Done);
        info!(
            path = ?execution.routing_path,
            attempts = execution.attempts.len(),
            fallback = ?execution.fallback,
            "EXECUTION_DONE"
        );
        execution
    }

    /// Correct the decision once: unknown ids go to the generalist, media
    /// tools without media go to a same-domain responder without tools.
    fn validate(
        &self,
        target: &RoutingTarget,
        has_media: bool,
        corrections: &mut Vec<String>,
    ) -> RoutingTarget {
        match target {
            RoutingTarget::Single(id) => {
                RoutingTarget::Single(self.resolve(id, has_media, corrections))
            }
            RoutingTarget::Parallel(ids) => {
                let mut kept: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids {
                    match self.catalog.get(id) {
                        Ok(d) if d.requires_media && !has_media => {
                            corrections
                                .push(format!("dropped '{}' from panel: no media attached", id));
                        }
                        Ok(_) if !kept.contains(id) => kept.push(id.clone()),
                        Ok(_) => {}
                        Err(e) => corrections.push(format!("dropped from panel: {}", e)),
                    }
                }

                if kept.is_empty() {
                    corrections.push(format!(
                        "empty panel, using '{}'",
                        self.config.generalist_id
                    ));
                    RoutingTarget::Single(self.config.generalist_id.clone())
                } else {
                    RoutingTarget::Parallel(kept)
                }
            }
        }
    }

    fn resolve(&self, id: &str, has_media: bool, corrections: &mut Vec<String>) -> String {
        let generalist = &self.config.generalist_id;

        let descriptor = match self.catalog.get(id) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(error = %e, "routing to generalist");
                corrections.push(format!("{}, using '{}'", e, generalist));
                return generalist.clone();
            }
        };

        if descriptor.requires_media && !has_media {
            let substitute = self
                .catalog
                .nearest_without_tools(&descriptor.domain, &descriptor.id)
                .map(|d| d.id.clone())
                .unwrap_or_else(|| generalist.clone());
            warn!(from = %id, to = %substitute, "media responder without media");
            corrections.push(format!(
                "'{}' needs media but none is attached, using '{}'",
                id, substitute
            ));
            return substitute;
        }

        id.to_string()
    }

    async fn run_single(
        &self,
        ctx: &AttemptContext,
        id: &str,
        deadline: Instant,
        execution: &mut Execution,
    ) {
        let outcome = attempt_loop(ctx, id, deadline).await;
        execution.routing_path.push(id.to_string());
        execution.stages.extend(outcome.stages);
        execution.attempts.extend(outcome.results);

        match outcome.answer {
            Ok(text) => {
                execution.text = text;
                if self.config.cross_route {
                    self.cross_route(ctx, id, deadline, execution).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "primary responder exhausted");
                self.fall_back(ctx, deadline, execution).await;
            }
        }
    }

    /// At most one hop to a responder the primary answer defers to.
    async fn cross_route(
        &self,
        ctx: &AttemptContext,
        from: &str,
        deadline: Instant,
        execution: &mut Execution,
    ) {
        // Suggested follow-up questions are not referrals.
        let body = extract_follow_ups_with(&execution.text, &self.follow_up_marker).clean_text;
        let Some((target, phrase)) = self.catalog.find_referral(&body, from) else {
            return;
        };
        if execution.visited(&target.id) {
            debug!(to = %target.id, "referral target already visited");
            return;
        }
        if target.requires_media && !ctx.session.has_media() {
            debug!(to = %target.id, "referral target needs media");
            return;
        }

        info!(from, to = %target.id, phrase = %phrase, "CROSS_ROUTE");
        execution.stages.push(Stage::CrossRoute);

        let to = target.id.clone();
        let outcome = attempt_loop(ctx, &to, deadline).await;
        execution.routing_path.push(to.clone());
        execution.stages.extend(outcome.stages);
        execution.attempts.extend(outcome.results);

        let succeeded = match outcome.answer {
            Ok(text) => {
                execution.text = match self.config.cross_route_mode {
                    CrossRouteMode::Append => format!("{}\n\n{}", execution.text.trim_end(), text),
                    CrossRouteMode::Replace => text,
                };
                true
            }
            Err(e) => {
                warn!(error = %e, "cross-route failed, keeping primary answer");
                false
            }
        };

        execution.cross_route = Some(CrossRoute {
            from: from.to_string(),
            to,
            phrase,
            succeeded,
        });
    }

    async fn run_parallel(
        &self,
        ctx: &AttemptContext,
        ids: &[String],
        deadline: Instant,
        execution: &mut Execution,
    ) {
        let panel_deadline = (Instant::now() + self.config.parallel_deadline).min(deadline);
        execution.stages.push(Stage::Execute);

        info!(panel = ?ids, "PARALLEL_FANOUT");
        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let task_ctx = ctx.clone();
                let task_id = id.clone();
                let handle = tokio::spawn(async move {
                    attempt_loop(&task_ctx, &task_id, panel_deadline).await
                });

                let id = id.clone();
                async move {
                    let mut handle = handle;
                    match timeout_at(panel_deadline + JOIN_GRACE, &mut handle).await {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => {
                            warn!(responder = %id, error = %e, "responder task failed");
                            let failure = FailureKind::Invocation(format!("task failed: {}", e));
                            AttemptOutcome::lost(id, failure)
                        }
                        Err(_) => {
                            handle.abort();
                            warn!(responder = %id, "responder task cancelled at deadline");
                            AttemptOutcome::lost(id, FailureKind::Timeout)
                        }
                    }
                }
            })
            .collect();

        let mut outcomes = join_all(tasks).await;
        execution.stages.push(Stage::QualityCheck);

        outcomes.sort_by_key(|o| {
            let rank = self
                .catalog
                .get(&o.responder_id)
                .map(|d| d.priority_rank)
                .unwrap_or(u32::MAX);
            (rank, o.responder_id.clone())
        });

        let mut sections = Vec::new();
        for outcome in outcomes {
            execution.routing_path.push(outcome.responder_id.clone());
            execution.attempts.extend(outcome.results);

            if let Ok(text) = outcome.answer {
                let name = self
                    .catalog
                    .get(&outcome.responder_id)
                    .map(|d| d.display_name.clone())
                    .unwrap_or_else(|_| outcome.responder_id.clone());
                sections.push(format!("【{}】\n{}", name, text.trim()));
            }
        }

        if sections.is_empty() {
            warn!("every panel responder failed");
            self.fall_back(ctx, deadline, execution).await;
        } else {
            info!(answered = sections.len(), panel = ids.len(), "PARALLEL_DONE");
            execution.text = sections.join("\n\n");
        }
    }

    /// Generalist, then the static apology.
    async fn fall_back(
        &self,
        ctx: &AttemptContext,
        deadline: Instant,
        execution: &mut Execution,
    ) {
        execution.stages.push(Stage::Fallback);
        let generalist = self.config.generalist_id.clone();

        if !execution.visited(&generalist) {
            info!(responder = %generalist, "FALLBACK_GENERALIST");
            let outcome = attempt_loop(ctx, &generalist, deadline).await;
            execution.routing_path.push(generalist);
            execution.stages.extend(outcome.stages);
            execution.attempts.extend(outcome.results);

            if let Ok(text) = outcome.answer {
                execution.text = text;
                execution.fallback = Some(FallbackTier::Generalist);
                return;
            }
        }

        warn!("FALLBACK_STATIC");
        execution.routing_path.push(STATIC_FALLBACK_MARKER.to_string());
        execution.text = self.config.apology.clone();
        execution.fallback = Some(FallbackTier::StaticApology);
    }
}
