//! Context builder for enriching the user's message before it reaches a responder.

use chrono::{Datelike, Local, Months, NaiveDate};
use responder_core::{ConversationTurn, FamilyProfile};

use crate::followups::{self, FollowUpExtraction, DEFAULT_FOLLOW_UP_MARKER};

/// Default number of history turns kept in the prompt.
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

/// Default per-turn character limit in the prompt.
pub const DEFAULT_MAX_TURN_CHARS: usize = 500;

const PROFILE_HEADER: &str = "[FAMILY PROFILE]";
const HISTORY_HEADER: &str = "[CONVERSATION HISTORY]";
const MESSAGE_HEADER: &str = "[CURRENT MESSAGE]";

/// Builds responder prompts and parses responder output.
///
/// Prompt building is a pure function of its inputs plus the reference date,
/// which is fixed with [`with_reference_date`](Self::with_reference_date) in
/// tests and defaults to the local date otherwise.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    reference_date: Option<NaiveDate>,
    max_history_turns: usize,
    max_turn_chars: usize,
    follow_up_marker: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            reference_date: None,
            max_history_turns: DEFAULT_MAX_HISTORY_TURNS,
            max_turn_chars: DEFAULT_MAX_TURN_CHARS,
            follow_up_marker: DEFAULT_FOLLOW_UP_MARKER.to_string(),
        }
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute ages relative to a fixed date instead of today.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_history_limits(mut self, max_turns: usize, max_turn_chars: usize) -> Self {
        self.max_history_turns = max_turns;
        self.max_turn_chars = max_turn_chars.max(1);
        self
    }

    /// Use a different follow-up marker when parsing responder output.
    pub fn with_follow_up_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() {
            self.follow_up_marker = marker;
        }
        self
    }

    pub fn follow_up_marker(&self) -> &str {
        &self.follow_up_marker
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Build the enriched prompt for a responder.
    ///
    /// Sections appear in a fixed order (profile, history, current message)
    /// and empty sections are left out.
    pub fn build_prompt(
        &self,
        message: &str,
        history: &[ConversationTurn],
        profile: Option<&FamilyProfile>,
    ) -> String {
        let mut sections = Vec::with_capacity(3);

        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            sections.push(self.format_profile(profile));
        }

        if !history.is_empty() && self.max_history_turns > 0 {
            sections.push(self.format_history(history));
        }

        sections.push(format!("{}\n{}", MESSAGE_HEADER, message.trim()));
        sections.join("\n\n")
    }

    fn format_profile(&self, profile: &FamilyProfile) -> String {
        let today = self.today();
        let mut out = String::from(PROFILE_HEADER);

        for (key, value) in profile.iter() {
            out.push_str(&format!("\n- {}: {}", key, value));
            if is_birth_date_key(key) {
                if let Some(birth) = parse_date(value) {
                    out.push_str(&format!(" ({})", describe_age(birth, today)));
                }
            }
        }
        out
    }

    fn format_history(&self, history: &[ConversationTurn]) -> String {
        let skip = history.len().saturating_sub(self.max_history_turns);
        let mut out = String::from(HISTORY_HEADER);

        for turn in &history[skip..] {
            out.push_str(&format!(
                "\n{}: {}",
                turn.role.label(),
                truncate_chars(turn.text.trim(), self.max_turn_chars)
            ));
        }
        out
    }

    /// Split raw responder output into the answer and follow-up questions.
    pub fn extract_follow_ups(&self, raw: &str) -> FollowUpExtraction {
        followups::extract_follow_ups_with(raw, &self.follow_up_marker)
    }
}

fn is_birth_date_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.ends_with("birth_date") || key.ends_with("birthday")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
        .ok()
}

fn describe_age(birth: NaiveDate, today: NaiveDate) -> String {
    match Age::between(birth, today) {
        Some(age) => format!("age: {}", age),
        None => format!("expected in {} days", (birth - today).num_days()),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Calendar age with month borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Age {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Age {
    /// Age on `today` of someone born on `birth`; `None` if not yet born.
    ///
    /// When today's day-of-month is before the birth day-of-month, one month
    /// is borrowed and the remaining days are counted from the month anchor
    /// (clamped to the end of short months).
    pub fn between(birth: NaiveDate, today: NaiveDate) -> Option<Self> {
        if today < birth {
            return None;
        }

        let mut total_months = (today.year() - birth.year()) * 12 + today.month() as i32
            - birth.month() as i32;
        if today.day() < birth.day() {
            total_months -= 1;
        }
        let total_months = u32::try_from(total_months).ok()?;

        let anchor = birth.checked_add_months(Months::new(total_months))?;
        let days = u32::try_from((today - anchor).num_days()).ok()?;

        Some(Self {
            years: total_months / 12,
            months: total_months % 12,
            days,
        })
    }
}

impl std::fmt::Display for Age {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} years {} months {} days",
            self.years, self.months, self.days
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn builder() -> ContextBuilder {
        ContextBuilder::new().with_reference_date(date(2026, 10, 17))
    }

    #[test]
    fn test_age_without_borrow() {
        let age = Age::between(date(2025, 4, 10), date(2026, 10, 17)).unwrap();
        assert_eq!(age, Age { years: 1, months: 6, days: 7 });
    }

    #[test]
    fn test_age_borrows_month() {
        // 17 < 20, so one month is borrowed: Sep 20 -> Oct 17 is 27 days.
        let age = Age::between(date(2026, 1, 20), date(2026, 10, 17)).unwrap();
        assert_eq!(age, Age { years: 0, months: 8, days: 27 });
    }

    #[test]
    fn test_age_end_of_month_anchor() {
        // Jan 31 + 1 month clamps to Feb 28.
        let age = Age::between(date(2026, 1, 31), date(2026, 3, 1)).unwrap();
        assert_eq!(age, Age { years: 0, months: 1, days: 1 });
    }

    #[test]
    fn test_age_on_birthday() {
        let age = Age::between(date(2024, 10, 17), date(2026, 10, 17)).unwrap();
        assert_eq!(age.to_string(), "2 years 0 months 0 days");
    }

    #[test]
    fn test_age_future_birth() {
        assert!(Age::between(date(2026, 12, 1), date(2026, 10, 17)).is_none());
    }

    #[test]
    fn test_prompt_message_only() {
        let prompt = builder().build_prompt("  夜泣きがひどいです ", &[], None);
        assert_eq!(prompt, "[CURRENT MESSAGE]\n夜泣きがひどいです");
    }

    #[test]
    fn test_prompt_with_profile_and_history() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        let history = vec![
            ConversationTurn::user("昨日も起きました", ts),
            ConversationTurn::responder("様子を教えてください", ts),
        ];
        let profile = FamilyProfile::new()
            .with("child_name", "はな")
            .with("child_birth_date", "2026/07/01");

        let prompt = builder().build_prompt("夜泣き", &history, Some(&profile));

        let expected = "[FAMILY PROFILE]\n\
            - child_birth_date: 2026/07/01 (age: 0 years 3 months 16 days)\n\
            - child_name: はな\n\n\
            [CONVERSATION HISTORY]\n\
            User: 昨日も起きました\n\
            Responder: 様子を教えてください\n\n\
            [CURRENT MESSAGE]\n\
            夜泣き";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_prompt_expected_birth() {
        let profile = FamilyProfile::new().with("due_birthday", "2026-10-27");
        let prompt = builder().build_prompt("準備", &[], Some(&profile));
        assert!(prompt.contains("(expected in 10 days)"));
    }

    #[test]
    fn test_unparseable_birth_date_left_as_is() {
        let profile = FamilyProfile::new().with("child_birth_date", "spring");
        let prompt = builder().build_prompt("hi", &[], Some(&profile));
        assert!(prompt.contains("- child_birth_date: spring\n"));
        assert!(!prompt.contains("age:"));
    }

    #[test]
    fn test_empty_profile_omitted() {
        let profile = FamilyProfile::new();
        let prompt = builder().build_prompt("hi", &[], Some(&profile));
        assert!(!prompt.contains(PROFILE_HEADER));
    }

    #[test]
    fn test_history_is_limited_and_truncated() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap();
        let history: Vec<ConversationTurn> = (0..5)
            .map(|i| ConversationTurn::user(format!("turn {} ああああ", i), ts))
            .collect();

        let prompt = builder()
            .with_history_limits(2, 6)
            .build_prompt("now", &history, None);

        assert!(!prompt.contains("turn 2"));
        assert!(prompt.contains("User: turn 3...\n"));
        assert!(prompt.contains("User: turn 4..."));
    }

    #[test]
    fn test_build_prompt_is_deterministic() {
        let profile = FamilyProfile::new().with("child_birthday", "2025-01-05");
        let a = builder().build_prompt("離乳食", &[], Some(&profile));
        let b = builder().build_prompt("離乳食", &[], Some(&profile));
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_uses_configured_marker() {
        let builder = ContextBuilder::new().with_follow_up_marker(">>");
        let extraction = builder.extract_follow_ups("答えです。\n>> 次は何\n");
        assert_eq!(extraction.questions, vec!["次は何？"]);
        assert_eq!(extraction.clean_text, "答えです。");
    }
}
