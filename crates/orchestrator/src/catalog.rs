//! Responder catalog: the immutable registry of specialist descriptors.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::OrchestratorError;

/// Id of the generalist responder in the built-in catalog.
pub const GENERALIST_ID: &str = "generalist";

/// Id of the emergency triage responder in the built-in catalog.
pub const EMERGENCY_ID: &str = "emergency_triage";

/// How much a responder's answers are trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceRating {
    High,
    #[default]
    Medium,
    Low,
}

/// Static description of one specialist responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderDescriptor {
    /// Unique id; also the key the responder implementation is registered under.
    pub id: String,
    pub display_name: String,
    /// Specialty family, used to find substitutes of the same kind.
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Lower rank wins ties and sorts first in aggregated answers.
    pub priority_rank: u32,
    #[serde(default)]
    pub has_tools: bool,
    /// Tool-requiring responder that only works when media is attached.
    #[serde(default)]
    pub requires_media: bool,
    #[serde(default)]
    pub confidence_rating: ConfidenceRating,
    /// Whether high-urgency messages belong to this responder's domain.
    #[serde(default)]
    pub handles_urgent: bool,
    /// Phrases another responder uses when deferring to this one.
    #[serde(default)]
    pub referral_phrases: Vec<String>,
}

impl ResponderDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        domain: impl Into<String>,
        priority_rank: u32,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            domain: domain.into(),
            keywords: BTreeSet::new(),
            priority_rank,
            has_tools: false,
            requires_media: false,
            confidence_rating: ConfidenceRating::default(),
            handles_urgent: false,
            referral_phrases: Vec::new(),
        }
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn referrals<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referral_phrases
            .extend(phrases.into_iter().map(Into::into));
        self
    }

    pub fn rating(mut self, rating: ConfidenceRating) -> Self {
        self.confidence_rating = rating;
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.has_tools = true;
        self
    }

    /// Mark as a media tool (implies `has_tools`).
    pub fn requiring_media(mut self) -> Self {
        self.has_tools = true;
        self.requires_media = true;
        self
    }

    pub fn urgent(mut self) -> Self {
        self.handles_urgent = true;
        self
    }

    /// Keywords found in an already lowercased message.
    pub fn matched_keywords<'a>(&'a self, lowered_message: &str) -> Vec<&'a str> {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty() && lowered_message.contains(&k.to_lowercase()))
            .map(String::as_str)
            .collect()
    }

    /// Number of distinct keywords present in an already lowercased message.
    pub fn keyword_hits(&self, lowered_message: &str) -> usize {
        self.matched_keywords(lowered_message).len()
    }
}

/// On-disk catalog format.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    responders: Vec<ResponderDescriptor>,
}

/// Immutable registry of responder descriptors.
///
/// Entries are kept ordered by `(priority_rank, id)` so every iteration is
/// deterministic. Share it across requests behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ResponderCatalog {
    entries: IndexMap<String, ResponderDescriptor>,
}

impl ResponderCatalog {
    /// Build a catalog, validating ids and flags.
    pub fn new(descriptors: Vec<ResponderDescriptor>) -> Result<Self, OrchestratorError> {
        let mut entries = IndexMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if descriptor.id.trim().is_empty() {
                return Err(OrchestratorError::Catalog(
                    "responder id must not be empty".to_string(),
                ));
            }
            if descriptor.requires_media && !descriptor.has_tools {
                return Err(OrchestratorError::Catalog(format!(
                    "{} requires media but has no tools",
                    descriptor.id
                )));
            }
            if entries.contains_key(&descriptor.id) {
                return Err(OrchestratorError::DuplicateResponder(descriptor.id));
            }
            entries.insert(descriptor.id.clone(), descriptor);
        }

        Ok(Self::sorted(entries))
    }

    fn sorted(mut entries: IndexMap<String, ResponderDescriptor>) -> Self {
        entries.sort_by(|_, a, _, b| {
            a.priority_rank
                .cmp(&b.priority_rank)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { entries }
    }

    /// Parse a catalog from JSON of the form `{"responders": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, OrchestratorError> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| OrchestratorError::Catalog(format!("parse error: {}", e)))?;
        Self::new(file.responders)
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_json_str(&content)?;
        info!("Loaded {} responders from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Load from `path` when given, otherwise use the built-in catalog.
    pub fn load(path: Option<&Path>) -> Result<Self, OrchestratorError> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => {
                info!("Using built-in responder catalog");
                Ok(Self::default_childcare())
            }
        }
    }

    /// The built-in childcare specialist catalog.
    pub fn default_childcare() -> Self {
        let entries = default_descriptors()
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Self::sorted(entries)
    }

    /// Look up a descriptor by id.
    pub fn get(&self, id: &str) -> Result<&ResponderDescriptor, OrchestratorError> {
        self.entries
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownResponder(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All descriptors, ordered by priority rank.
    pub fn all(&self) -> impl Iterator<Item = &ResponderDescriptor> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Responders with at least one keyword in `message`, best match first.
    ///
    /// Ordered by hit count (descending), then priority rank, then id.
    pub fn find_by_keyword(&self, message: &str) -> Vec<(&ResponderDescriptor, usize)> {
        let lowered = message.to_lowercase();
        let mut matches: Vec<(&ResponderDescriptor, usize)> = self
            .all()
            .map(|d| (d, d.keyword_hits(&lowered)))
            .filter(|(_, hits)| *hits > 0)
            .collect();

        // Catalog order already breaks ties by rank then id; the sort is stable.
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches
    }

    /// Top-priority responders eligible for a parallel consultation.
    pub fn parallel_panel(&self, cap: usize, exclude: &[&str]) -> Vec<String> {
        self.all()
            .filter(|d| !d.requires_media && !exclude.contains(&d.id.as_str()))
            .take(cap)
            .map(|d| d.id.clone())
            .collect()
    }

    /// Lowest-rank responder of `domain` that needs no tools.
    pub fn nearest_without_tools(
        &self,
        domain: &str,
        exclude_id: &str,
    ) -> Option<&ResponderDescriptor> {
        self.all()
            .find(|d| d.domain == domain && !d.has_tools && d.id != exclude_id)
    }

    /// First responder (by rank) whose referral phrase appears in `text`.
    ///
    /// `from_id` is never returned, so a responder cannot refer to itself.
    pub fn find_referral(
        &self,
        text: &str,
        from_id: &str,
    ) -> Option<(&ResponderDescriptor, String)> {
        let lowered = text.to_lowercase();
        for descriptor in self.all().filter(|d| d.id != from_id) {
            for phrase in &descriptor.referral_phrases {
                if !phrase.is_empty() && lowered.contains(&phrase.to_lowercase()) {
                    debug!(
                        from = %from_id,
                        to = %descriptor.id,
                        phrase = %phrase,
                        "referral phrase detected"
                    );
                    return Some((descriptor, phrase.clone()));
                }
            }
        }
        None
    }
}

fn default_descriptors() -> Vec<ResponderDescriptor> {
    use ConfidenceRating::{High, Medium};

    vec![
        ResponderDescriptor::new(EMERGENCY_ID, "緊急トリアージ", "emergency", 0)
            .keywords(["救急", "意識", "けいれん", "痙攣", "呼吸", "誤飲", "窒息", "emergency"])
            .referrals(["救急外来", "119番", "emergency care"])
            .rating(High)
            .urgent(),
        ResponderDescriptor::new("health", "健康・病気の専門家", "health", 1)
            .keywords([
                "熱", "発熱", "咳", "鼻水", "下痢", "嘔吐", "発疹", "湿疹", "予防接種", "ワクチン",
                "病院", "小児科", "fever", "cough", "vaccine",
            ])
            .referrals(["小児科の専門家", "健康の専門家", "pediatric specialist"])
            .rating(High)
            .urgent(),
        ResponderDescriptor::new("sleep", "睡眠の専門家", "sleep", 2)
            .keywords([
                "夜泣き", "寝かしつけ", "睡眠", "昼寝", "ねんね", "寝ない", "夜中", "sleep", "nap",
                "bedtime",
            ])
            .referrals(["睡眠の専門家", "sleep specialist"])
            .rating(High),
        ResponderDescriptor::new("nutrition", "栄養・食事の専門家", "nutrition", 3)
            .keywords([
                "離乳食", "ミルク", "授乳", "母乳", "食事", "食べない", "アレルギー", "栄養",
                "好き嫌い", "weaning", "formula", "feeding",
            ])
            .referrals(["栄養の専門家", "nutrition specialist"])
            .rating(High),
        ResponderDescriptor::new("development", "発達の専門家", "development", 4)
            .keywords([
                "発達", "成長", "寝返り", "はいはい", "つかまり立ち", "歩く", "言葉", "身長",
                "体重", "milestone",
            ])
            .referrals(["発達の専門家", "development specialist"])
            .rating(High),
        ResponderDescriptor::new("behavior", "行動・しつけの専門家", "behavior", 5)
            .keywords(["イヤイヤ", "かんしゃく", "癇癪", "しつけ", "叱る", "反抗", "tantrum"])
            .referrals(["行動の専門家", "behavior specialist"])
            .rating(Medium),
        ResponderDescriptor::new("play", "遊び・学びの専門家", "play", 6)
            .keywords(["遊び", "おもちゃ", "絵本", "知育", "play", "toys"])
            .referrals(["遊びの専門家", "play specialist"])
            .rating(Medium),
        ResponderDescriptor::new("outing", "おでかけ・イベント案内", "activities", 7)
            .keywords(["公園", "おでかけ", "お出かけ", "イベント", "児童館", "outing"])
            .referrals(["おでかけ案内", "outing guide"])
            .rating(Medium)
            .with_tools(),
        ResponderDescriptor::new("image_analysis", "画像解析", "health", 8)
            .keywords(["写真", "画像", "photo", "picture"])
            .rating(Medium)
            .requiring_media(),
        ResponderDescriptor::new(GENERALIST_ID, "子育て相談", "general", 99).rating(Medium),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = ResponderCatalog::new(default_descriptors()).unwrap();
        assert_eq!(catalog.len(), ResponderCatalog::default_childcare().len());
        assert!(catalog.contains(GENERALIST_ID));
        assert!(catalog.contains(EMERGENCY_ID));
    }

    #[test]
    fn test_all_is_ordered_by_rank() {
        let catalog = ResponderCatalog::default_childcare();
        let ranks: Vec<u32> = catalog.all().map(|d| d.priority_rank).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
        assert_eq!(catalog.ids().first(), Some(&EMERGENCY_ID));
    }

    #[test]
    fn test_get_unknown() {
        let catalog = ResponderCatalog::default_childcare();
        assert!(catalog.get("sleep").is_ok());
        assert!(matches!(
            catalog.get("astrology"),
            Err(OrchestratorError::UnknownResponder(id)) if id == "astrology"
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = ResponderCatalog::new(vec![
            ResponderDescriptor::new("a", "A", "x", 1),
            ResponderDescriptor::new("a", "A again", "x", 2),
        ]);
        assert!(matches!(result, Err(OrchestratorError::DuplicateResponder(id)) if id == "a"));
    }

    #[test]
    fn test_media_without_tools_rejected() {
        let mut descriptor = ResponderDescriptor::new("img", "Image", "health", 1);
        descriptor.requires_media = true;
        assert!(matches!(
            ResponderCatalog::new(vec![descriptor]),
            Err(OrchestratorError::Catalog(_))
        ));
    }

    #[test]
    fn test_find_by_keyword() {
        let catalog = ResponderCatalog::default_childcare();
        let matches = catalog.find_by_keyword("3ヶ月の子の夜泣きがひどいです");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0.id, "sleep");
        assert_eq!(matches[0].1, 1);

        assert!(catalog.find_by_keyword("こんにちは").is_empty());
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let catalog = ResponderCatalog::default_childcare();
        let matches = catalog.find_by_keyword("My baby won't SLEEP at BEDTIME");
        assert_eq!(matches[0].0.id, "sleep");
        assert_eq!(matches[0].1, 2);
    }

    #[test]
    fn test_parallel_panel() {
        let catalog = ResponderCatalog::default_childcare();
        let panel = catalog.parallel_panel(3, &[GENERALIST_ID, EMERGENCY_ID]);
        assert_eq!(panel, vec!["health", "sleep", "nutrition"]);

        let all = catalog.parallel_panel(100, &[]);
        assert!(!all.contains(&"image_analysis".to_string()));
    }

    #[test]
    fn test_nearest_without_tools() {
        let catalog = ResponderCatalog::default_childcare();
        let nearest = catalog.nearest_without_tools("health", "image_analysis").unwrap();
        assert_eq!(nearest.id, "health");
        assert!(catalog.nearest_without_tools("activities", "outing").is_none());
    }

    #[test]
    fn test_find_referral() {
        let catalog = ResponderCatalog::default_childcare();
        let text =
            "離乳食の進め方はこちらです。夜の寝つきについては睡眠の専門家にも相談してみてください。";
        let (target, phrase) = catalog.find_referral(text, "nutrition").unwrap();
        assert_eq!(target.id, "sleep");
        assert_eq!(phrase, "睡眠の専門家");

        // A responder never refers to itself.
        assert!(catalog.find_referral("睡眠の専門家として答えます", "sleep").is_none());
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "responders": [
                {"id": "general", "display_name": "General", "priority_rank": 10},
                {"id": "sleep", "display_name": "Sleep", "domain": "sleep",
                 "keywords": ["sleep"], "priority_rank": 1, "confidence_rating": "high"}
            ]
        }"#;
        let catalog = ResponderCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.ids(), vec!["sleep", "general"]);
        assert_eq!(
            catalog.get("sleep").unwrap().confidence_rating,
            ConfidenceRating::High
        );
        assert!(!catalog.get("general").unwrap().has_tools);
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(matches!(
            ResponderCatalog::from_json_str("not json"),
            Err(OrchestratorError::Catalog(_))
        ));
    }
}
