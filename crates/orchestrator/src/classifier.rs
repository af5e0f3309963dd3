//! LLM-backed intent classification.

use std::env;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use responder_core::{
    prompt_fingerprint, IntentAnalysis, IntentClassifier, InvocationError, Responder,
    SessionContext,
};
use tracing::{debug, info, trace, warn};

use crate::catalog::ResponderCatalog;

/// Default path for the classifier prompt file.
pub const DEFAULT_CLASSIFIER_PROMPT_FILE: &str = "CLASSIFIER_PROMPT.md";

/// Default classifier system prompt (fallback if file not found).
pub const DEFAULT_CLASSIFIER_PROMPT: &str = r#"You analyze messages sent to a childcare consultation service. Parents write mostly in Japanese.

Output a single JSON object with these fields:
- "intent_type": one of "question", "worry", "emergency", "report", "chat"
- "urgency_level": integer 1 (routine) to 5 (call an ambulance now)
- "emotion_tone": short label such as "calm", "anxious", "exhausted", "panicked"
- "key_entities": important nouns from the message (symptoms, foods, ages)
- "suggested_agents": ids of the specialists who should answer, best first
- "confidence": 0.0 to 1.0, how sure you are about suggested_agents
- "reasoning": one short sentence

Examples:

[MESSAGE: 3ヶ月の子の夜泣きがひどいです]
→ {"intent_type": "worry", "urgency_level": 2, "emotion_tone": "exhausted", "key_entities": ["夜泣き", "3ヶ月"], "suggested_agents": ["sleep"], "confidence": 0.9, "reasoning": "night waking in an infant"}

[MESSAGE: 熱が39度あってぐったりしています]
→ {"intent_type": "worry", "urgency_level": 4, "emotion_tone": "anxious", "key_entities": ["熱", "39度"], "suggested_agents": ["health"], "confidence": 0.85, "reasoning": "high fever with lethargy"}

Respond with JSON only. No explanation."#;

/// Load the classifier system prompt.
///
/// Priority:
/// 1. `ORCHESTRATOR_CLASSIFIER_PROMPT` env var (if set)
/// 2. Contents of prompt file (`ORCHESTRATOR_CLASSIFIER_PROMPT_FILE`,
///    default `CLASSIFIER_PROMPT.md`)
/// 3. Embedded default prompt
pub fn load_classifier_prompt() -> String {
    if let Ok(prompt) = env::var("ORCHESTRATOR_CLASSIFIER_PROMPT") {
        info!("Using classifier prompt from ORCHESTRATOR_CLASSIFIER_PROMPT env var");
        return prompt;
    }

    let prompt_file = env::var("ORCHESTRATOR_CLASSIFIER_PROMPT_FILE")
        .unwrap_or_else(|_| DEFAULT_CLASSIFIER_PROMPT_FILE.to_string());

    if let Some(prompt) = load_prompt_file(&prompt_file) {
        info!("Loaded classifier prompt from {}", prompt_file);
        return prompt;
    }

    info!("Using embedded default classifier prompt");
    DEFAULT_CLASSIFIER_PROMPT.to_string()
}

/// Returns the trimmed file content, or `None` if missing, unreadable or blank.
fn load_prompt_file(path: impl AsRef<Path>) -> Option<String> {
    let content = std::fs::read_to_string(path.as_ref()).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Adapts any [`Responder`] (typically an LLM) into an [`IntentClassifier`].
///
/// The responder receives the classifier prompt followed by the message and
/// must answer with a JSON [`IntentAnalysis`]. Code fences, surrounding prose
/// and stray trailing braces are tolerated.
pub struct ResponderIntentClassifier {
    responder: Arc<dyn Responder>,
    prompt: String,
    prompt_hash: String,
}

impl ResponderIntentClassifier {
    /// Create a classifier using [`load_classifier_prompt`].
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self::with_prompt(responder, load_classifier_prompt())
    }

    pub fn with_prompt(responder: Arc<dyn Responder>, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let prompt_hash = prompt_fingerprint(&prompt);
        info!(
            "Intent classifier using '{}' (prompt {})",
            responder.name(),
            prompt_hash
        );
        Self {
            responder,
            prompt,
            prompt_hash,
        }
    }

    /// Append the catalog's responder ids so suggestions use valid ids.
    pub fn with_catalog(mut self, catalog: &ResponderCatalog) -> Self {
        let listing: Vec<String> = catalog
            .all()
            .map(|d| format!("- {}: {}", d.id, d.display_name))
            .collect();
        self.prompt = format!(
            "{}\n\nAvailable specialist ids:\n{}",
            self.prompt,
            listing.join("\n")
        );
        self.prompt_hash = prompt_fingerprint(&self.prompt);
        self
    }

    pub fn prompt_hash(&self) -> &str {
        &self.prompt_hash
    }

    fn parse_analysis(response: &str) -> Result<IntentAnalysis, InvocationError> {
        let json = extract_json(response);
        serde_json::from_str::<IntentAnalysis>(json)
            .map(IntentAnalysis::normalized)
            .map_err(|e| InvocationError::Failed(format!("invalid intent JSON: {}", e)))
    }
}

#[async_trait]
impl IntentClassifier for ResponderIntentClassifier {
    async fn classify(&self, message: &str) -> Result<IntentAnalysis, InvocationError> {
        let prompt = format!("{}\n\n[MESSAGE: {}]", self.prompt, message.trim());
        let session = SessionContext::new("intent-classifier", "intent-classifier");

        debug!(prompt_hash = %self.prompt_hash, "classifying message");
        let response = self.responder.invoke(&prompt, &session).await?;
        trace!(response = %response, "classifier raw response");

        let analysis = Self::parse_analysis(&response).map_err(|e| {
            warn!(error = %e, "classifier returned unparseable output");
            e
        })?;

        info!(
            intent = %analysis.intent_type,
            urgency = analysis.urgency_level,
            suggested = ?analysis.suggested_agents,
            confidence = analysis.confidence,
            "CLASSIFIER_RESULT"
        );
        Ok(analysis)
    }

    fn name(&self) -> &str {
        self.responder.name()
    }
}

/// Extract JSON from a response that may contain markdown or other text.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return extract_balanced_json(trimmed);
    }

    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return extract_balanced_json(trimmed[json_start..json_start + end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_backticks = &trimmed[start + 3..];
        // Skip optional language identifier
        let json_start = after_backticks.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after_backticks[json_start..].find("```") {
            return extract_balanced_json(after_backticks[json_start..json_start + end].trim());
        }
    }

    if let Some(start) = trimmed.find('{') {
        return extract_balanced_json(&trimmed[start..]);
    }

    trimmed
}

/// Cut a string starting with `{` at its matching closing brace.
///
/// LLMs sometimes emit extra trailing braces or prose after the object.
pub fn extract_balanced_json(s: &str) -> &str {
    if !s.starts_with('{') {
        return s;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &s[..=i];
                }
            }
            _ => {}
        }
    }

    s
}
