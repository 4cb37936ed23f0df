//! Named-entity extraction for captions.
//!
//! `EntityRecognizer` is the seam for a real NER model; `HeuristicRecognizer`
//! is the built-in backend that classifies capitalized phrases by their
//! keywords. `EntityExtractor` wraps either and never fails.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HomeRegion;

/// Entity category, mirroring the usual NER label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    GeoPolitical,
    Facility,
    Organization,
    Location,
    Person,
    Other,
}

impl EntityCategory {
    /// Map a conventional NER label (`GPE`, `FAC`, `ORG`, `LOC`, ...).
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "GPE" => Self::GeoPolitical,
            "FAC" => Self::Facility,
            "ORG" => Self::Organization,
            "LOC" => Self::Location,
            "PERSON" | "PER" => Self::Person,
            _ => Self::Other,
        }
    }

    pub fn is_place_like(self) -> bool {
        matches!(
            self,
            Self::GeoPolitical | Self::Facility | Self::Organization | Self::Location
        )
    }

    pub fn is_business_like(self) -> bool {
        matches!(self, Self::Organization | Self::Facility)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub category: EntityCategory,
}

impl Entity {
    pub fn new(text: impl Into<String>, category: EntityCategory) -> Self {
        Self { text: text.into(), category }
    }
}

#[derive(Debug, Error)]
#[error("entity recognizer '{backend}' failed: {message}")]
pub struct RecognizerError {
    pub backend: String,
    pub message: String,
}

/// Pluggable NER backend: text in, ordered entities out.
pub trait EntityRecognizer: Send + Sync {
    fn backend_id(&self) -> &str;

    fn recognize(&self, text: &str) -> Result<Vec<Entity>, RecognizerError>;
}

// ─── Extractor ──────────────────────────────────────────────────

pub struct EntityExtractor {
    recognizer: Box<dyn EntityRecognizer>,
}

impl EntityExtractor {
    pub fn new(recognizer: Box<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    fn entities(&self, text: &str) -> Vec<Entity> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        match self.recognizer.recognize(text) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(backend = self.recognizer.backend_id(), error = %e, "entity extraction failed");
                Vec::new()
            }
        }
    }

    /// Texts of all geo-political, facility, organization and location entities.
    pub fn location_names(&self, text: &str) -> Vec<String> {
        let names: Vec<String> = self
            .entities(text)
            .into_iter()
            .filter(|e| e.category.is_place_like())
            .map(|e| e.text)
            .collect();
        debug!(?names, "extracted location names");
        names
    }

    /// First organization or facility entity, if any.
    pub fn first_business(&self, text: &str) -> Option<String> {
        self.entities(text)
            .into_iter()
            .find(|e| e.category.is_business_like())
            .map(|e| e.text)
    }
}

// ─── Heuristic backend ──────────────────────────────────────────

static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}[\w'&-]*(?:[ \t]+\p{Lu}[\w'&-]*)*").expect("valid regex")
});

const FACILITY_SUFFIXES: &[&str] = &[
    "road", "rd", "street", "st", "junction", "jn", "mall", "nagar", "market", "station",
    "hub", "bridge", "square", "complex", "tower", "towers", "plaza", "centre", "center",
    "building", "lane", "avenue", "metro", "airport", "temple", "church", "mosque", "park",
];

const ORGANIZATION_WORDS: &[&str] = &[
    "cafe", "café", "restaurant", "bakery", "bakers", "hotel", "kitchen", "bistro", "store",
    "stores", "shop", "boutique", "studio", "bar", "brewery", "foods", "eatery", "creamery",
    "coffee", "tea", "dhaba", "mess", "ltd", "pvt", "co",
];

const LOCATION_SUFFIXES: &[&str] = &[
    "beach", "island", "lake", "hill", "hills", "falls", "backwaters", "valley", "river",
];

const KNOWN_REGIONS: &[&str] = &[
    "india", "kerala", "kochi", "cochin", "ernakulam", "thiruvananthapuram", "trivandrum",
    "kozhikode", "calicut", "thrissur", "alappuzha", "alleppey", "munnar", "kottayam",
    "bengaluru", "bangalore", "chennai", "mumbai", "delhi", "hyderabad", "goa", "mysuru",
    "pune", "kolkata",
];

/// Keyword-driven recognizer over capitalized phrases.
pub struct HeuristicRecognizer {
    regions: HashSet<String>,
}

impl HeuristicRecognizer {
    pub fn new(home: &HomeRegion) -> Self {
        let mut regions: HashSet<String> = KNOWN_REGIONS.iter().map(|s| s.to_string()).collect();
        regions.insert(home.city.to_lowercase());
        regions.insert(home.state.to_lowercase());
        Self { regions }
    }

    fn classify(&self, phrase: &str) -> Option<EntityCategory> {
        let words: Vec<String> = phrase
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        let last = words.last()?;

        if words.len() > 1 && FACILITY_SUFFIXES.contains(&last.as_str()) {
            return Some(EntityCategory::Facility);
        }
        if words.iter().any(|w| ORGANIZATION_WORDS.contains(&w.as_str())) {
            return Some(EntityCategory::Organization);
        }
        if LOCATION_SUFFIXES.contains(&last.as_str()) {
            return Some(EntityCategory::Location);
        }
        if words.iter().any(|w| self.regions.contains(w)) {
            return Some(EntityCategory::GeoPolitical);
        }
        None
    }
}

impl EntityRecognizer for HeuristicRecognizer {
    fn backend_id(&self) -> &str {
        "heuristic"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>, RecognizerError> {
        let mut seen = HashSet::new();
        let mut entities = Vec::new();

        for m in CAPITALIZED_RUN.find_iter(text) {
            // skip hashtags and handles
            if matches!(text[..m.start()].chars().next_back(), Some('#') | Some('@')) {
                continue;
            }
            let phrase = m.as_str().trim();
            if let Some(category) = self.classify(phrase) {
                if seen.insert(phrase.to_string()) {
                    entities.push(Entity::new(phrase, category));
                }
            }
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingRecognizer;

    impl EntityRecognizer for FailingRecognizer {
        fn backend_id(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<Entity>, RecognizerError> {
            Err(RecognizerError {
                backend: "failing".into(),
                message: "model not loaded".into(),
            })
        }
    }

    struct FixedRecognizer(Vec<Entity>);

    impl EntityRecognizer for FixedRecognizer {
        fn backend_id(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<Entity>, RecognizerError> {
            Ok(self.0.clone())
        }
    }

    fn heuristic() -> HeuristicRecognizer {
        HeuristicRecognizer::new(&HomeRegion::default())
    }

    #[test]
    fn test_failure_is_advisory() {
        let ex = EntityExtractor::new(Box::new(FailingRecognizer));
        assert!(ex.location_names("Lulu Mall, Kochi").is_empty());
        assert!(ex.first_business("Lulu Mall, Kochi").is_none());
    }

    #[test]
    fn test_filters_categories_in_order() {
        let ex = EntityExtractor::new(Box::new(FixedRecognizer(vec![
            Entity::new("Anu", EntityCategory::Person),
            Entity::new("Kochi", EntityCategory::GeoPolitical),
            Entity::new("Lulu Mall", EntityCategory::Facility),
            Entity::new("Kashi Art Cafe", EntityCategory::Organization),
        ])));
        assert_eq!(ex.location_names("x"), vec!["Kochi", "Lulu Mall", "Kashi Art Cafe"]);
        assert_eq!(ex.first_business("x").as_deref(), Some("Lulu Mall"));
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(EntityCategory::from_label("GPE"), EntityCategory::GeoPolitical);
        assert_eq!(EntityCategory::from_label("fac"), EntityCategory::Facility);
        assert_eq!(EntityCategory::from_label("DATE"), EntityCategory::Other);
        assert!(!EntityCategory::Person.is_place_like());
    }

    #[test]
    fn test_heuristic_classification() {
        let found = heuristic()
            .recognize("Tried the waffles at Kashi Art Cafe near Lulu Mall in Fort Kochi today")
            .unwrap();
        assert_eq!(
            found,
            vec![
                Entity::new("Kashi Art Cafe", EntityCategory::Organization),
                Entity::new("Lulu Mall", EntityCategory::Facility),
                Entity::new("Fort Kochi", EntityCategory::GeoPolitical),
            ]
        );
    }

    #[test]
    fn test_heuristic_skips_hashtags_and_plain_words() {
        let found = heuristic()
            .recognize("Best biryani ever!\n#Kochi #FoodieLife @Kochi")
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_heuristic_dedupes() {
        let found = heuristic().recognize("Cherai Beach. Cherai Beach again").unwrap();
        assert_eq!(found, vec![Entity::new("Cherai Beach", EntityCategory::Location)]);
    }

    #[test]
    fn test_heuristic_uses_home_region() {
        let rec = HeuristicRecognizer::new(&HomeRegion {
            city: "Udaipur".into(),
            state: "Rajasthan".into(),
            postal_code: "313001".into(),
        });
        let found = rec.recognize("Sunset views from Udaipur").unwrap();
        assert_eq!(found, vec![Entity::new("Udaipur", EntityCategory::GeoPolitical)]);
    }
}
