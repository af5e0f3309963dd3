//! Follow-up question extraction and generation.
//!
//! Responders are asked to end their answer with suggested follow-up
//! questions, each introduced by a marker (`💭` by default):
//!
//! ```text
//! 夜泣きは生後3ヶ月ごろによく見られます。...
//!
//! 【フォローアップ質問】
//! 💭 寝る前のルーティンはありますか
//! 💭 昼寝は何回していますか
//! ```
//!
//! [`extract_follow_ups`] separates these from the answer. When a responder
//! embeds none, [`FollowUpGenerator`] asks a lightweight responder for some
//! and falls back to a fixed generic set.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use responder_core::{Responder, SessionContext};
use tracing::{debug, warn};

use crate::request::FollowUpSource;

/// Marker that introduces a follow-up question.
pub const DEFAULT_FOLLOW_UP_MARKER: &str = "💭";

/// Maximum number of follow-up questions returned.
pub const MAX_FOLLOW_UPS: usize = 3;

/// Header lines that introduce a follow-up block, compared after stripping
/// decoration and lowercasing.
const SECTION_HEADERS: &[&str] = &[
    "フォローアップ質問",
    "フォローアップ",
    "関連する質問",
    "次に聞いてみたいこと",
    "こんな質問もできます",
    "follow-up questions",
    "follow up questions",
    "followup questions",
    "follow-ups",
    "suggested questions",
];

/// Generic questions used when nothing better is available.
pub const STATIC_FOLLOW_UPS: [&str; MAX_FOLLOW_UPS] = [
    "お子さんの最近の様子をもう少し詳しく教えていただけますか？",
    "ほかに気になっていることはありますか？",
    "ご家庭で試してみたことがあれば教えてください。",
];

/// Result of splitting responder output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpExtraction {
    /// The answer with marked content and follow-up headers removed.
    pub clean_text: String,
    /// Up to [`MAX_FOLLOW_UPS`] questions, deduplicated, in source order.
    pub questions: Vec<String>,
}

/// Extract follow-ups introduced by [`DEFAULT_FOLLOW_UP_MARKER`].
pub fn extract_follow_ups(raw: &str) -> FollowUpExtraction {
    extract_follow_ups_with(raw, DEFAULT_FOLLOW_UP_MARKER)
}

/// Extract follow-ups introduced by `marker`.
///
/// Input without any marker is returned unchanged with no questions. The
/// clean text never contains the marker, so applying this to its own
/// `clean_text` is a no-op.
pub fn extract_follow_ups_with(raw: &str, marker: &str) -> FollowUpExtraction {
    if marker.is_empty() || !raw.contains(marker) {
        return FollowUpExtraction {
            clean_text: raw.to_string(),
            questions: Vec::new(),
        };
    }

    let mut questions: IndexSet<String> = IndexSet::new();
    let mut kept: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let Some((before, after)) = line.split_once(marker) else {
            kept.push(line);
            continue;
        };

        // A marker-led line closes any header block directly above it,
        // wherever the block sits in a combined answer.
        if before.trim().is_empty() {
            drop_header_block(&mut kept);
        }

        for segment in after.split(marker) {
            if let Some(question) = normalize_question(segment) {
                questions.insert(question);
            }
        }

        let before = before.trim_end();
        if !before.trim().is_empty() {
            kept.push(before);
        }
    }

    drop_header_block(&mut kept);

    FollowUpExtraction {
        clean_text: kept.join("\n").trim_end().to_string(),
        questions: questions.into_iter().take(MAX_FOLLOW_UPS).collect(),
    }
}

/// Pop trailing blank and follow-up header lines.
fn drop_header_block(kept: &mut Vec<&str>) {
    while let Some(last) = kept.last() {
        if last.trim().is_empty() || is_section_header(last) {
            kept.pop();
        } else {
            break;
        }
    }
}

fn normalize_question(segment: &str) -> Option<String> {
    let text = segment
        .trim()
        .trim_start_matches(['-', '*', '・', '•'])
        .trim();
    if text.is_empty() {
        return None;
    }
    if text.ends_with('?') || text.ends_with('？') {
        return Some(text.to_string());
    }

    let mark = if text.is_ascii() { '?' } else { '？' };
    Some(format!("{}{}", text, mark))
}

fn is_section_header(line: &str) -> bool {
    let stripped = line
        .trim()
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '#' | '*' | ':' | '：' | '【' | '】' | '■' | '-' | '_')
        })
        .to_lowercase();
    !stripped.is_empty() && SECTION_HEADERS.contains(&stripped.as_str())
}

/// Follow-up questions plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUps {
    pub questions: Vec<String>,
    pub source: FollowUpSource,
}

impl FollowUps {
    /// The fixed generic set.
    pub fn fallback() -> Self {
        Self {
            questions: STATIC_FOLLOW_UPS.iter().map(|q| q.to_string()).collect(),
            source: FollowUpSource::StaticFallback,
        }
    }
}

/// Best-effort follow-up generation for answers that embedded none.
///
/// With a responder configured, it gets one attempt plus a single retry,
/// each bounded by the timeout. Anything else yields
/// [`STATIC_FOLLOW_UPS`].
#[derive(Clone)]
pub struct FollowUpGenerator {
    responder: Option<Arc<dyn Responder>>,
    timeout: Duration,
    marker: String,
}

impl FollowUpGenerator {
    /// Default time allowed for each generation attempt.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    const ATTEMPTS: u32 = 2;

    /// Generator that only ever returns the static set.
    pub fn static_only() -> Self {
        Self {
            responder: None,
            timeout: Self::DEFAULT_TIMEOUT,
            marker: DEFAULT_FOLLOW_UP_MARKER.to_string(),
        }
    }

    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self {
            responder: Some(responder),
            ..Self::static_only()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() {
            self.marker = marker;
        }
        self
    }

    pub fn has_responder(&self) -> bool {
        self.responder.is_some()
    }

    /// Produce follow-up questions for an answer.
    pub async fn generate(
        &self,
        message: &str,
        answer: &str,
        session: &SessionContext,
    ) -> FollowUps {
        let Some(responder) = &self.responder else {
            return FollowUps::fallback();
        };

        let prompt = self.build_prompt(message, answer);

        for attempt in 1..=Self::ATTEMPTS {
            match tokio::time::timeout(self.timeout, responder.invoke(&prompt, session)).await {
                Ok(Ok(reply)) => {
                    let questions = self.parse_reply(&reply);
                    if !questions.is_empty() {
                        debug!(
                            responder = responder.name(),
                            attempt,
                            count = questions.len(),
                            "generated follow-up questions"
                        );
                        return FollowUps {
                            questions,
                            source: FollowUpSource::Generated,
                        };
                    }
                    warn!(
                        responder = responder.name(),
                        attempt,
                        "follow-up reply had no questions"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        responder = responder.name(),
                        attempt,
                        error = %e,
                        "follow-up generation failed"
                    );
                }
                Err(_) => {
                    warn!(responder = responder.name(), attempt, "follow-up generation timed out");
                }
            }
        }

        FollowUps::fallback()
    }

    fn build_prompt(&self, message: &str, answer: &str) -> String {
        format!(
            "以下の相談と回答を読み、保護者が次に聞きたくなりそうな質問を最大{}個、\
             1行に1つずつ「{}」で始めて書いてください。\n\n\
             [相談]\n{}\n\n[回答]\n{}",
            MAX_FOLLOW_UPS,
            self.marker,
            message.trim(),
            answer.trim()
        )
    }

    /// Marked questions when present, otherwise every non-empty line.
    fn parse_reply(&self, reply: &str) -> Vec<String> {
        let extraction = extract_follow_ups_with(reply, &self.marker);
        if !extraction.questions.is_empty() {
            return extraction.questions;
        }

        let mut questions: IndexSet<String> = IndexSet::new();
        for line in reply.lines() {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '、'));
            if is_section_header(line) {
                continue;
            }
            if let Some(question) = normalize_question(line) {
                questions.insert(question);
            }
        }
        questions.into_iter().take(MAX_FOLLOW_UPS).collect()
    }
}

impl std::fmt::Debug for FollowUpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUpGenerator")
            .field("responder", &self.responder.as_ref().map(|r| r.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use responder_core::InvocationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_no_markers_is_unchanged() {
        let raw = "夜泣きは成長の一過程です。\n\n様子を見ましょう。\n";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.clean_text, raw);
        assert!(extraction.questions.is_empty());
    }

    #[test]
    fn test_extracts_lines_and_header() {
        let raw = "夜泣きは生後3ヶ月ごろによく見られます。\n\n\
                   【フォローアップ質問】\n\
                   💭 寝る前のルーティンはありますか\n\
                   💭 昼寝は何回していますか？\n";
        let extraction = extract_follow_ups(raw);

        assert_eq!(extraction.clean_text, "夜泣きは生後3ヶ月ごろによく見られます。");
        assert_eq!(
            extraction.questions,
            vec!["寝る前のルーティンはありますか？", "昼寝は何回していますか？"]
        );
    }

    #[test]
    fn test_inline_segments() {
        let raw = "Try a bedtime routine. 💭 How long are naps 💭 When is bedtime?";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.clean_text, "Try a bedtime routine.");
        assert_eq!(
            extraction.questions,
            vec!["How long are naps?", "When is bedtime?"]
        );
    }

    #[test]
    fn test_dedup_and_cap() {
        let raw = "answer text\n💭 a\n💭 b\n💭 a\n💭 c\n💭 d";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.questions, vec!["a?", "b?", "c?"]);
    }

    #[test]
    fn test_markdown_header_removed() {
        let raw = "Answer body here.\n\n### Follow-up questions:\n💭 What else";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.clean_text, "Answer body here.");
    }

    #[test]
    fn test_header_in_body_is_kept() {
        let raw = "フォローアップ質問\nの説明です。\n💭 次は？";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.clean_text, "フォローアップ質問\nの説明です。");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let inputs = [
            "本文です。\n【フォローアップ質問】\n💭 質問1\n💭 質問2",
            "本文です。\n\n【フォローアップ質問】\n💭 質問1\n\n続きの本文です。",
            "Try a bedtime routine. 💭 How long are naps 💭 When is bedtime?",
            "💭 質問だけ",
            "💭",
            "本文です。\r\n\r\n【フォローアップ質問】\r\n💭 質問1\r\n💭 質問2\r\n",
            "本文の途中に💭が入っています。\nもう一行。",
            "【健康・病気の専門家】\n発熱の話です。\n\n【フォローアップ質問】\n💭 熱は何度ですか\n\n\
             【睡眠の専門家】\n夜泣きの話です。\n\n【フォローアップ質問】\n💭 何時に寝ますか",
            "睡眠の専門家にも相談してください。\n\n【フォローアップ質問】\n💭 昼寝は？\n\n\
             夜泣きは生後3ヶ月ごろによく見られます。",
            "マーカーのない本文です。\n\n【フォローアップ質問】",
            "",
        ];

        for raw in inputs {
            let once = extract_follow_ups(raw);
            let twice = extract_follow_ups(&once.clean_text);
            assert_eq!(twice.clean_text, once.clean_text, "input: {:?}", raw);
            assert!(twice.questions.is_empty(), "input: {:?}", raw);
            assert!(!once.clean_text.contains(DEFAULT_FOLLOW_UP_MARKER), "input: {:?}", raw);
        }
    }

    #[test]
    fn test_header_blocks_removed_from_combined_answers() {
        let raw =
            "【健康・病気の専門家】\n発熱の話です。\n\n【フォローアップ質問】\n💭 熱は何度ですか\n\n\
                   【睡眠の専門家】\n夜泣きの話です。\n\n【フォローアップ質問】\n💭 何時に寝ますか";
        let extraction = extract_follow_ups(raw);

        assert_eq!(
            extraction.clean_text,
            "【健康・病気の専門家】\n発熱の話です。\n\n【睡眠の専門家】\n夜泣きの話です。"
        );
        assert_eq!(extraction.questions, vec!["熱は何度ですか？", "何時に寝ますか？"]);
    }

    #[test]
    fn test_header_before_appended_answer_removed() {
        let raw = "睡眠の専門家にも相談してください。\n\n【フォローアップ質問】\n💭 昼寝は？\n\n\
                   夜泣きは生後3ヶ月ごろによく見られます。";
        let extraction = extract_follow_ups(raw);

        assert_eq!(
            extraction.clean_text,
            "睡眠の専門家にも相談してください。\n\n夜泣きは生後3ヶ月ごろによく見られます。"
        );
        assert_eq!(extraction.questions, vec!["昼寝は？"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = "本文です。\r\n\r\n【フォローアップ質問】\r\n💭 質問1\r\n";
        let extraction = extract_follow_ups(raw);
        assert_eq!(extraction.clean_text, "本文です。");
        assert_eq!(extraction.questions, vec!["質問1？"]);
    }

    #[test]
    fn test_only_follow_ups_leaves_empty_text() {
        let extraction = extract_follow_ups("💭 質問");
        assert!(extraction.clean_text.is_empty());
        assert_eq!(extraction.questions.len(), 1);
    }

    struct CountingResponder {
        replies: Vec<Result<String, InvocationError>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Responder for CountingResponder {
        async fn invoke(
            &self,
            _prompt: &str,
            _session: &SessionContext,
        ) -> Result<String, InvocationError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .get(i)
                .cloned()
                .unwrap_or_else(|| Err(InvocationError::Failed("exhausted".into())))
        }

        fn name(&self) -> &str {
            "followups"
        }
    }

    #[tokio::test]
    async fn test_static_only() {
        let generator = FollowUpGenerator::static_only();
        let follow_ups = generator.generate("q", "a", &SessionContext::default()).await;
        assert_eq!(follow_ups.source, FollowUpSource::StaticFallback);
        assert_eq!(follow_ups.questions.len(), MAX_FOLLOW_UPS);
    }

    #[tokio::test]
    async fn test_generate_retries_once() {
        let responder = Arc::new(CountingResponder {
            replies: vec![
                Err(InvocationError::Failed("boom".into())),
                Ok("1. 寝る時間は決まっていますか\n2. 部屋は暗いですか".into()),
            ],
            calls: AtomicUsize::new(0),
        });
        let generator = FollowUpGenerator::new(responder.clone());
        let follow_ups = generator.generate("夜泣き", "answer", &SessionContext::default()).await;

        assert_eq!(follow_ups.source, FollowUpSource::Generated);
        assert_eq!(
            follow_ups.questions,
            vec!["寝る時間は決まっていますか？", "部屋は暗いですか？"]
        );
        assert_eq!(responder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generate_falls_back_after_two_failures() {
        let responder = Arc::new(CountingResponder {
            replies: vec![
                Err(InvocationError::Timeout),
                Err(InvocationError::Failed("boom".into())),
                Ok("💭 never reached".into()),
            ],
            calls: AtomicUsize::new(0),
        });
        let generator = FollowUpGenerator::new(responder.clone());
        let follow_ups = generator.generate("q", "a", &SessionContext::default()).await;

        assert_eq!(follow_ups, FollowUps::fallback());
        assert_eq!(responder.calls.load(Ordering::SeqCst), 2);
    }
}
