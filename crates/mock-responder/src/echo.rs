//! Echo and static responders.

use responder_core::{async_trait, InvocationError, Responder, SessionContext};

/// A responder that echoes the prompt back.
///
/// Useful for exercising the pipeline without any model: the echoed prompt
/// always shares topical terms with the message it was built from.
#[derive(Debug, Clone, Default)]
pub struct EchoResponder {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoResponder {
    /// Create a new EchoResponder with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoResponder with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_responder::EchoResponder;
    ///
    /// let responder = EchoResponder::with_prefix("Echo: ");
    /// // Will respond with "Echo: <prompt>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn invoke(
        &self,
        prompt: &str,
        _session: &SessionContext,
    ) -> Result<String, InvocationError> {
        Ok(match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, prompt),
            None => prompt.to_string(),
        })
    }

    fn name(&self) -> &str {
        "EchoResponder"
    }
}

/// A responder that always answers with the same text.
#[derive(Debug, Clone)]
pub struct StaticResponder {
    name: String,
    text: String,
}

impl StaticResponder {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Responder for StaticResponder {
    async fn invoke(
        &self,
        _prompt: &str,
        _session: &SessionContext,
    ) -> Result<String, InvocationError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
