//! Query normalization: handle stripping, postal-code correction, comma
//! cleanup and the home-region qualifier.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::config::{HomeRegion, PostalCorrection};

static DOTTED_HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+\.\w+").expect("valid regex"));
static HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").expect("valid regex"));
static COMMA_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*(?:,\s*)+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

impl HomeRegion {
    /// Append whichever qualifier tier is missing from `text`.
    ///
    /// Neither city nor state → `city, state, postal`; city only →
    /// `state, postal`; state without postal code → `postal`; else nothing.
    pub fn qualify(&self, text: &str) -> String {
        let has_city = text.contains(&self.city);
        let has_state = text.contains(&self.state);

        let suffix: Vec<&str> = if !has_city && !has_state {
            vec![&self.city, &self.state, &self.postal_code]
        } else if has_city && !has_state {
            vec![&self.state, &self.postal_code]
        } else if has_state && !text.contains(&self.postal_code) {
            vec![&self.postal_code]
        } else {
            vec![]
        };

        if suffix.is_empty() {
            return text.to_string();
        }
        let suffix = suffix.join(", ");
        if text.is_empty() {
            suffix
        } else {
            format!("{}, {}", text, suffix)
        }
    }
}

/// Turns a raw location phrase into a region-biased provider query.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    region: HomeRegion,
    corrections: Vec<(Regex, String)>,
}

impl TextNormalizer {
    pub fn new(region: HomeRegion, corrections: &[PostalCorrection]) -> Self {
        let corrections = corrections
            .iter()
            .filter(|c| !c.from.is_empty())
            .map(|c| {
                let pattern = format!(r"\b{}\b", regex::escape(&c.from));
                // escaped literal between word boundaries always compiles
                (Regex::new(&pattern).expect("valid regex"), c.to.clone())
            })
            .collect();
        Self { region, corrections }
    }

    pub fn region(&self) -> &HomeRegion {
        &self.region
    }

    pub fn normalize(&self, phrase: &str) -> String {
        if phrase.trim().is_empty() {
            return String::new();
        }

        let text = DOTTED_HANDLE.replace_all(phrase, "");
        let mut text = HANDLE.replace_all(&text, "").into_owned();

        for (pattern, replacement) in &self.corrections {
            text = pattern.replace_all(&text, replacement.as_str()).into_owned();
        }

        let text = COMMA_RUN.replace_all(text.trim(), ", ");
        let text = text.trim_matches(|c: char| c == ',' || c.is_whitespace());

        let qualified = self.region.qualify(text);
        let normalized = WHITESPACE.replace_all(&qualified, " ").trim().to_string();

        debug!(raw = phrase, normalized = %normalized, "normalized location block");
        normalized
    }
}
