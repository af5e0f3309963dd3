//! Scripted and always-failing responders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use responder_core::{async_trait, InvocationError, Responder, SessionContext};

/// A responder that plays back a queue of outcomes, one per call.
///
/// Once the queue is empty every further call returns the `then` outcome.
/// All prompts are recorded so tests can assert on what the orchestrator sent.
pub struct ScriptedResponder {
    name: String,
    script: Mutex<VecDeque<Result<String, InvocationError>>>,
    then: Result<String, InvocationError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedResponder {
    /// Create a responder that answers `text` once the script runs out.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            then: Ok(text.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue `count` failures before the steady-state answer.
    pub fn failing_first(name: impl Into<String>, count: usize, text: impl Into<String>) -> Self {
        let responder = Self::new(name, text);
        for attempt in 1..=count {
            responder.push(Err(InvocationError::Failed(format!(
                "scripted failure {}",
                attempt
            ))));
        }
        responder
    }

    /// Append an outcome to the script.
    pub fn push(&self, outcome: Result<String, InvocationError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Builder-style [`push`](Self::push).
    pub fn then_reply(self, outcome: Result<String, InvocationError>) -> Self {
        self.push(outcome);
        self
    }

    /// Number of times `invoke` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn invoke(
        &self,
        prompt: &str,
        _session: &SessionContext,
    ) -> Result<String, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| self.then.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A responder whose every call fails.
pub struct FailingResponder {
    name: String,
    error: InvocationError,
    calls: AtomicUsize,
}

impl FailingResponder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_error(name, InvocationError::Failed("always failing".to_string()))
    }

    pub fn with_error(name: impl Into<String>, error: InvocationError) -> Self {
        Self {
            name: name.into(),
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for FailingResponder {
    async fn invoke(
        &self,
        _prompt: &str,
        _session: &SessionContext,
    ) -> Result<String, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
