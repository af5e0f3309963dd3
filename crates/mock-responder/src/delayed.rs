//! Slow responders for deadline and cancellation tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use responder_core::{async_trait, InvocationError, Responder, SessionContext};
use tokio::time::sleep;

/// Wraps another responder and answers only after `delay`.
///
/// Counts calls started and calls that ran to completion. A call whose
/// future was dropped mid-delay (a timeout or an aborted task) is started
/// but never completed, so `cancelled()` tells a test whether the caller
/// really gave up on it.
pub struct DelayedResponder<R: Responder> {
    inner: R,
    delay: Duration,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl<R: Responder> DelayedResponder<R> {
    pub fn new(inner: R, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_millis(inner: R, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    pub fn with_secs(inner: R, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Calls that reached `invoke`.
    pub fn calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Calls that waited out the delay and returned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Calls dropped before the delay elapsed.
    pub fn cancelled(&self) -> usize {
        self.calls().saturating_sub(self.completed())
    }
}

#[async_trait]
impl<R: Responder> Responder for DelayedResponder<R> {
    async fn invoke(
        &self,
        prompt: &str,
        session: &SessionContext,
    ) -> Result<String, InvocationError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        let reply = self.inner.invoke(prompt, session).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        reply
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}
