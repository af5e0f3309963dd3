//! Responder set: the implementations behind catalog ids.

use std::collections::HashMap;
use std::sync::Arc;

use responder_core::{InvocationError, Responder, SessionContext};
use tracing::{debug, info};

/// Responder implementations keyed by catalog id.
///
/// Built once at startup and shared read-only across requests.
#[derive(Clone, Default)]
pub struct ResponderSet {
    responders: HashMap<String, Arc<dyn Responder>>,
}

impl ResponderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a responder under a catalog id.
    ///
    /// If one with the same id already exists, it will be replaced.
    pub fn register<R: Responder + 'static>(&mut self, id: impl Into<String>, responder: R) {
        self.register_arc(id, Arc::new(responder));
    }

    /// Register a shared responder.
    pub fn register_arc(&mut self, id: impl Into<String>, responder: Arc<dyn Responder>) {
        let id = id.into();
        info!("Registering responder '{}' ({})", id, responder.name());
        self.responders.insert(id, responder);
    }

    /// Builder-style registration.
    pub fn with<R: Responder + 'static>(mut self, id: impl Into<String>, responder: R) -> Self {
        self.register(id, responder);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Responder>> {
        self.responders.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.responders.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.responders.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.responders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responders.is_empty()
    }

    /// Invoke the responder registered under `id`.
    pub async fn invoke(
        &self,
        id: &str,
        prompt: &str,
        session: &SessionContext,
    ) -> Result<String, InvocationError> {
        let responder = self
            .responders
            .get(id)
            .ok_or_else(|| {
                InvocationError::Unavailable(format!("no responder registered for '{}'", id))
            })?;

        debug!("Invoking responder '{}' with {} char prompt", id, prompt.chars().count());
        responder.invoke(prompt, session).await
    }
}

impl std::fmt::Debug for ResponderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderSet")
            .field("ids", &self.ids())
            .finish()
    }
}
