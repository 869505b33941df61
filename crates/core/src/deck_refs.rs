//! Extraction of inline deck references from lesson bodies.
//!
//! Lessons embed decks with a markdown-image-like marker: `![deck](<uuid>)`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::model::DeckId;

static DECK_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[deck\]\(([a-f0-9\-]{36})\)").expect("deck reference pattern is valid")
});

/// Returns the deck IDs referenced in `body`, in order of first appearance.
///
/// Duplicates are dropped and matches whose payload is not a valid UUID are
/// skipped.
#[must_use]
pub fn parse_deck_references(body: &str) -> Vec<DeckId> {
    let mut seen = HashSet::new();
    DECK_REFERENCE_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| Uuid::parse_str(m.as_str()).ok())
        .filter(|id| seen.insert(*id))
        .map(DeckId::new)
        .collect()
}

/// Same as [`parse_deck_references`], in progress-tree key form.
#[must_use]
pub fn parse_deck_reference_keys(body: &str) -> Vec<String> {
    parse_deck_references(body)
        .iter()
        .map(DeckId::key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0b7c2a8e-5d1f-4c6a-9e3b-1f2d3c4b5a69";
    const B: &str = "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    #[test]
    fn empty_body_has_no_references() {
        assert!(parse_deck_references("").is_empty());
        assert!(parse_deck_references("# Intro\n\nNo decks here.").is_empty());
    }

    #[test]
    fn references_keep_order_and_drop_duplicates() {
        let body = format!("![deck]({B})\ntext\n![deck]({A})\n![deck]({B})");
        let keys = parse_deck_reference_keys(&body);
        assert_eq!(keys, vec![B.to_string(), A.to_string()]);
    }

    #[test]
    fn malformed_ids_are_skipped() {
        let body = format!(
            "![deck](------------------------------------) ![deck]({A}) ![deck](not-a-uuid)"
        );
        assert_eq!(parse_deck_reference_keys(&body), vec![A.to_string()]);
    }

    #[test]
    fn other_image_markers_are_ignored() {
        let body = format!("![image]({A}) ![Deck]({B})");
        assert!(parse_deck_references(&body).is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let body = format!("![deck]({A}) and ![deck]({B})");
        assert_eq!(parse_deck_references(&body), parse_deck_references(&body));
    }
}
