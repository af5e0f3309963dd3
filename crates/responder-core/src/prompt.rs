//! Prompt helpers for fingerprinting prompts in diagnostics.

use sha2::{Digest, Sha256};

/// Length of the short fingerprint carried in diagnostics.
const FINGERPRINT_LEN: usize = 12;

/// Compute a stable SHA-256 hex digest for a prompt string.
pub fn hash_prompt(prompt: &str) -> String {
    Sha256::digest(prompt.as_bytes())
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Short prefix of [`hash_prompt`], enough to correlate log lines.
pub fn prompt_fingerprint(prompt: &str) -> String {
    let mut hex = hash_prompt(prompt);
    hex.truncate(FINGERPRINT_LEN);
    hex
}
