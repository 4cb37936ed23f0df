//! Caption parsing: locate the location block and the business name.
//!
//! The first line containing a marker keyword wins. Its post-colon text is
//! extended with the following lines until a blank, `#` or `@` line. Without
//! a marker line the entity extractor supplies the block.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::entities::EntityExtractor;
use crate::caption::RawCaption;

/// Substrings that flag a location-announcing line (matched on lowercase).
pub const MARKER_KEYWORDS: &[&str] = &[
    "location",
    "address",
    "place",
    "shop location",
    "\u{1F4CD}", // 📍
    "\u{1F3E0}", // 🏠
    "\u{1F3E2}", // 🏢
    "\u{1F3EA}", // 🏪
];

static HANDLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOrigin {
    Marker,
    Entities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCaption {
    pub location_block: String,
    pub business_name: Option<String>,
    pub origin: BlockOrigin,
}

/// Block following the first marker line, or `None` when no line matches.
/// A matched line with nothing usable yields `Some("")`.
pub fn marker_block(lines: &[&str]) -> Option<String> {
    let (index, line) = lines.iter().enumerate().find(|(_, line)| {
        let lower = line.trim().to_lowercase();
        MARKER_KEYWORDS.iter().any(|k| lower.contains(k))
    })?;

    let head = match line.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => line.trim(),
    };

    let continuation: Vec<&str> = lines[index + 1..]
        .iter()
        .map(|l| l.trim())
        .take_while(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('@'))
        .collect();

    let mut block = head.to_string();
    if !continuation.is_empty() {
        block.push(' ');
        block.push_str(&continuation.join(" "));
    }
    Some(block.trim().to_string())
}

/// The first `@handle` token, without the `@`.
pub fn handle_name(text: &str) -> Option<String> {
    HANDLE.captures(text).map(|c| c[1].to_string())
}

pub struct DescriptionParser<'a> {
    entities: &'a EntityExtractor,
}

impl<'a> DescriptionParser<'a> {
    pub fn new(entities: &'a EntityExtractor) -> Self {
        Self { entities }
    }

    /// Handle first, then the first organization/facility entity.
    pub fn business_name(&self, text: &str) -> Option<String> {
        if let Some(handle) = handle_name(text) {
            info!(business = %handle, "business name from handle");
            return Some(handle);
        }
        let name = self.entities.first_business(text);
        if let Some(ref n) = name {
            info!(business = %n, "business name from entities");
        }
        name
    }

    /// `None` means the caption carries no location signal at all.
    pub fn parse(&self, caption: &RawCaption) -> Option<ParsedCaption> {
        let text = caption.text();
        let business_name = self.business_name(text);
        let lines: Vec<&str> = caption.lines().collect();

        if let Some(block) = marker_block(&lines).filter(|b| !b.is_empty()) {
            debug!(block = %block, "location block from marker line");
            return Some(ParsedCaption {
                location_block: block,
                business_name,
                origin: BlockOrigin::Marker,
            });
        }

        info!("no location block found, falling back to entity extraction");
        let names = self.entities.location_names(text);
        if names.is_empty() {
            return None;
        }
        Some(ParsedCaption {
            location_block: names.join(" "),
            business_name,
            origin: BlockOrigin::Entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HomeRegion;
    use crate::text::entities::{Entity, EntityCategory, EntityRecognizer, HeuristicRecognizer, RecognizerError};

    struct FixedRecognizer(Vec<Entity>);

    impl EntityRecognizer for FixedRecognizer {
        fn backend_id(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<Entity>, RecognizerError> {
            Ok(self.0.clone())
        }
    }

    fn no_entities() -> EntityExtractor {
        EntityExtractor::new(Box::new(FixedRecognizer(vec![])))
    }

    #[test]
    fn test_marker_with_continuation() {
        let lines = ["Location: MG Road", "Near City Mall", "", "#foodie"];
        assert_eq!(marker_block(&lines).as_deref(), Some("MG Road Near City Mall"));
    }

    #[test]
    fn test_stops_at_hashtag_and_mention() {
        let lines = ["Address: 12/3 Broadway", "Ernakulam", "#kochi", "Not this"];
        assert_eq!(marker_block(&lines).as_deref(), Some("12/3 Broadway Ernakulam"));

        let lines = ["Address: 12/3 Broadway", "  @someone  ", "Not this"];
        assert_eq!(marker_block(&lines).as_deref(), Some("12/3 Broadway"));
    }

    #[test]
    fn test_marker_without_colon_uses_whole_line() {
        let lines = ["\u{1F4CD} Panampilly Nagar", "Kochi"];
        assert_eq!(
            marker_block(&lines).as_deref(),
            Some("\u{1F4CD} Panampilly Nagar Kochi")
        );
    }

    #[test]
    fn test_first_marker_wins() {
        let lines = [
            "Great vibes",
            "SHOP LOCATION: Vyttila",
            "Address: Kakkanad",
        ];
        // "Address:" is a continuation line of the first block, not a second block
        assert_eq!(marker_block(&lines).as_deref(), Some("Vyttila Address: Kakkanad"));

        let lines = ["Place: Vyttila", "", "Address: Kakkanad"];
        assert_eq!(marker_block(&lines).as_deref(), Some("Vyttila"));
    }

    #[test]
    fn test_splits_on_first_colon_only() {
        let lines = ["Location: Shop 4: Oberon Mall"];
        assert_eq!(marker_block(&lines).as_deref(), Some("Shop 4: Oberon Mall"));
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(marker_block(&["Tasty food", "#yum"]), None);
        assert_eq!(marker_block(&[]), None);
    }

    #[test]
    fn test_empty_marker_block() {
        assert_eq!(marker_block(&["Location:", ""]).as_deref(), Some(""));
    }

    #[test]
    fn test_handle_precedence() {
        let ex = EntityExtractor::new(Box::new(FixedRecognizer(vec![Entity::new(
            "Kashi Art Cafe",
            EntityCategory::Organization,
        )])));
        let parser = DescriptionParser::new(&ex);
        assert_eq!(
            parser.business_name("Visit @shopname.kochi or DM @shopname").as_deref(),
            Some("shopname")
        );
        assert_eq!(
            parser.business_name("Visit Kashi Art Cafe").as_deref(),
            Some("Kashi Art Cafe")
        );
    }

    #[test]
    fn test_parse_marker_caption() {
        let ex = no_entities();
        let caption = RawCaption::new("Best shawarma!\nLocation: MG Road\nNear City Mall\n\n#foodie @grillhouse");
        let parsed = DescriptionParser::new(&ex).parse(&caption).unwrap();
        assert_eq!(parsed.location_block, "MG Road Near City Mall");
        assert_eq!(parsed.business_name.as_deref(), Some("grillhouse"));
        assert_eq!(parsed.origin, BlockOrigin::Marker);
    }

    #[test]
    fn test_parse_entity_fallback() {
        let ex = EntityExtractor::new(Box::new(HeuristicRecognizer::new(&HomeRegion::default())));
        let caption = RawCaption::new("Sunday brunch at Kashi Art Cafe in Fort Kochi");
        let parsed = DescriptionParser::new(&ex).parse(&caption).unwrap();
        assert_eq!(parsed.location_block, "Kashi Art Cafe Fort Kochi");
        assert_eq!(parsed.business_name.as_deref(), Some("Kashi Art Cafe"));
        assert_eq!(parsed.origin, BlockOrigin::Entities);
    }

    #[test]
    fn test_parse_empty_marker_falls_back() {
        let ex = EntityExtractor::new(Box::new(FixedRecognizer(vec![Entity::new(
            "Marine Drive",
            EntityCategory::Facility,
        )])));
        let caption = RawCaption::new("Location:\n\nsee you there");
        let parsed = DescriptionParser::new(&ex).parse(&caption).unwrap();
        assert_eq!(parsed.location_block, "Marine Drive");
        assert_eq!(parsed.origin, BlockOrigin::Entities);
    }

    #[test]
    fn test_parse_nothing_found() {
        let ex = no_entities();
        let caption = RawCaption::new("so good\n#yum");
        assert!(DescriptionParser::new(&ex).parse(&caption).is_none());
    }
}
