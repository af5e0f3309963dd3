//! Response quality validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Default minimum answer length, in characters.
pub const DEFAULT_MIN_RESPONSE_CHARS: usize = 10;

/// Why an answer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum QualityIssue {
    Empty,
    TooShort { chars: usize, min: usize },
    /// No topical term shared between the message and the answer.
    OffTopic,
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty response"),
            Self::TooShort { chars, min } => {
                write!(f, "response too short ({} < {} chars)", chars, min)
            }
            Self::OffTopic => write!(f, "response does not address the message"),
        }
    }
}

/// Rejects empty and too-short answers, and flags off-topic ones.
#[derive(Debug, Clone)]
pub struct QualityChecker {
    min_chars: usize,
    check_relevance: bool,
}

impl Default for QualityChecker {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_RESPONSE_CHARS,
            check_relevance: true,
        }
    }
}

impl QualityChecker {
    pub fn new(min_chars: usize) -> Self {
        Self {
            min_chars,
            ..Self::default()
        }
    }

    /// Disable the off-topic heuristic.
    pub fn without_relevance(mut self) -> Self {
        self.check_relevance = false;
        self
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Check an answer against the user's message.
    ///
    /// A message with no topical terms (greetings, very short text) never
    /// fails the relevance check.
    pub fn check(&self, message: &str, answer: &str) -> Result<(), QualityIssue> {
        self.check_with_keywords(message, answer, std::iter::empty::<&str>())
    }

    /// Like [`check`](Self::check), also accepting an answer that mentions
    /// any of the answering responder's keywords as relevant.
    ///
    /// Relevance is only judged when message and answer are written in the
    /// same script family; a Japanese answer to an English message is not
    /// off-topic just because no terms can be shared.
    pub fn check_with_keywords<'a>(
        &self,
        message: &str,
        answer: &str,
        keywords: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), QualityIssue> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(QualityIssue::Empty);
        }

        let chars = answer.chars().count();
        if chars < self.min_chars {
            return Err(QualityIssue::TooShort {
                chars,
                min: self.min_chars,
            });
        }

        if self.check_relevance && !is_relevant(message, answer, keywords) {
            return Err(QualityIssue::OffTopic);
        }

        Ok(())
    }
}

impl QualityIssue {
    /// Soft issues are retried, but an answer carrying one is still better
    /// than no answer once the attempts run out.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::OffTopic)
    }
}

fn is_relevant<'a>(
    message: &str,
    answer: &str,
    keywords: impl IntoIterator<Item = &'a str>,
) -> bool {
    let wanted = topical_terms(message);
    if wanted.is_empty() || has_cjk(message) != has_cjk(answer) {
        return true;
    }
    if !wanted.is_disjoint(&topical_terms(answer)) {
        return true;
    }

    let lowered = answer.to_lowercase();
    keywords
        .into_iter()
        .any(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
}

fn has_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '々')
}

fn is_katakana(c: char) -> bool {
    matches!(c, '\u{30A0}'..='\u{30FF}' | '\u{FF66}'..='\u{FF9F}')
}

fn is_hiragana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}')
}

fn is_cjk(c: char) -> bool {
    is_kanji(c) || is_katakana(c) || is_hiragana(c)
}

/// Topical terms: lowercased ASCII words of three or more characters, and
/// CJK bigrams containing at least one kanji or katakana character.
pub fn topical_terms(text: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    let mut word = String::new();
    let mut run: Vec<char> = Vec::new();

    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_alphanumeric() {
            word.push(c.to_ascii_lowercase());
        } else if word.len() >= 3 {
            terms.insert(std::mem::take(&mut word));
        } else {
            word.clear();
        }

        if is_cjk(c) {
            run.push(c);
        } else {
            push_bigrams(&run, &mut terms);
            run.clear();
        }
    }

    terms
}

fn push_bigrams(run: &[char], terms: &mut HashSet<String>) {
    for pair in run.windows(2) {
        if pair.iter().any(|&c| is_kanji(c) || is_katakana(c)) {
            terms.insert(pair.iter().collect());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let checker = QualityChecker::default();
        assert_eq!(checker.check("夜泣き", "   "), Err(QualityIssue::Empty));
    }

    #[test]
    fn test_too_short() {
        let checker = QualityChecker::default();
        assert_eq!(
            checker.check("夜泣き", "夜泣きです"),
            Err(QualityIssue::TooShort { chars: 5, min: 10 })
        );
    }

    #[test]
    fn test_on_topic_japanese() {
        let checker = QualityChecker::default();
        let answer = "夜泣きは生後3ヶ月ごろから多く見られます。";
        assert!(checker.check("3ヶ月の子の夜泣きがひどいです", answer).is_ok());
    }

    #[test]
    fn test_off_topic() {
        let checker = QualityChecker::default();
        let answer = "今日の天気は晴れのち曇りでしょう。";
        assert_eq!(
            checker.check("離乳食を食べません", answer),
            Err(QualityIssue::OffTopic)
        );
        assert!(checker.without_relevance().check("離乳食を食べません", answer).is_ok());
    }

    #[test]
    fn test_on_topic_english_case_insensitive() {
        let checker = QualityChecker::default();
        assert!(checker
            .check("My baby won't SLEEP", "Sleep regressions are common at four months.")
            .is_ok());
    }

    #[test]
    fn test_cross_language_answer_is_not_off_topic() {
        let checker = QualityChecker::default();
        assert!(checker
            .check("My baby won't sleep at night", "夜泣きは生後3ヶ月ごろによく見られます。")
            .is_ok());
        assert!(checker
            .check("夜泣きがひどいです", "Night waking is common around three months.")
            .is_ok());
    }

    #[test]
    fn test_responder_keywords_count_as_relevant() {
        let checker = QualityChecker::default();
        let answer = "おかゆをひとさじから始め、離乳食は無理せずゆっくり進めましょう。";
        assert_eq!(
            checker.check("ご飯を食べません", answer),
            Err(QualityIssue::OffTopic)
        );
        assert!(checker
            .check_with_keywords("ご飯を食べません", answer, ["離乳食", "授乳"])
            .is_ok());
    }

    #[test]
    fn test_only_off_topic_is_soft() {
        assert!(QualityIssue::OffTopic.is_soft());
        assert!(!QualityIssue::Empty.is_soft());
        assert!(!QualityIssue::TooShort { chars: 1, min: 10 }.is_soft());
    }

    #[test]
    fn test_message_without_terms_passes() {
        let checker = QualityChecker::default();
        assert!(checker.check("こんにちは", "はい、どうぞご相談ください。").is_ok());
    }

    #[test]
    fn test_topical_terms() {
        let terms = topical_terms("夜泣き and sleep at 3am");
        assert!(terms.contains("夜泣"));
        assert!(terms.contains("泣き"));
        assert!(terms.contains("and"));
        assert!(terms.contains("sleep"));
        assert!(terms.contains("3am"));
        assert!(!terms.contains("at"));

        // Hiragana-only bigrams are too generic to count.
        assert!(topical_terms("こんにちは").is_empty());
    }

    #[test]
    fn test_issue_display() {
        let issue = QualityIssue::TooShort { chars: 3, min: 10 };
        assert_eq!(issue.to_string(), "response too short (3 < 10 chars)");
    }
}
