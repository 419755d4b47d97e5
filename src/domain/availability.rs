//! Size availability parsing.
//!
//! A status block carries one line per size, each with a marker glyph:
//!
//! ```text
//! 🟢 M          in stock
//! 🟡 L          a few left (counts as available)
//! 🔴 XL         sold out
//! • 🟢 <b>S</b> bullets and markup are tolerated
//! ```
//!
//! The derived set is what gets compared between passes; the raw text is
//! only persisted.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

pub const IN_STOCK: &str = "🟢";
pub const LOW_STOCK: &str = "🟡";
pub const OUT_OF_STOCK: &str = "🔴";

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));

/// Sizes currently available according to a raw status block.
pub fn available_sizes(text: &str) -> BTreeSet<String> {
    text.lines().filter_map(size_token).collect()
}

fn size_token(line: &str) -> Option<String> {
    let marker = if line.contains(IN_STOCK) {
        IN_STOCK
    } else if line.contains(LOW_STOCK) {
        LOW_STOCK
    } else {
        return None;
    };

    let line = line.trim_start_matches(|c: char| c == '•' || c == '-' || c == '*' || c.is_whitespace());
    let (_, after) = line.split_once(marker)?;
    let after = strip_markup(after);

    after.split_whitespace().next().map(str::to_uppercase)
}

/// Remove `<...>` tags, keeping their text content.
pub fn strip_markup(s: &str) -> String {
    MARKUP_TAG.replace_all(s, "").into_owned()
}

/// Sizes a subscriber cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WantedSizes {
    /// No filter: every size counts.
    Any,
    Only(BTreeSet<String>),
}

impl WantedSizes {
    /// Parse a comma-separated filter such as `"m, L,xl"`. Blank input means [`WantedSizes::Any`].
    pub fn parse(raw: Option<&str>) -> Self {
        let sizes: BTreeSet<String> = raw
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase)
            .collect();

        if sizes.is_empty() {
            WantedSizes::Any
        } else {
            WantedSizes::Only(sizes)
        }
    }

    /// Whether a non-empty availability set is of interest.
    pub fn matches(&self, available: &BTreeSet<String>) -> bool {
        match self {
            WantedSizes::Any => !available.is_empty(),
            WantedSizes::Only(wanted) => !wanted.is_disjoint(available),
        }
    }

    /// Sorted sizes to show: the intersection for an explicit filter, everything otherwise.
    pub fn shown(&self, available: &BTreeSet<String>) -> Vec<String> {
        match self {
            WantedSizes::Any => available.iter().cloned().collect(),
            WantedSizes::Only(wanted) => wanted.intersection(available).cloned().collect(),
        }
    }

    /// Canonical form for the `sizes` column.
    pub fn to_storage(&self) -> Option<String> {
        match self {
            WantedSizes::Any => None,
            WantedSizes::Only(sizes) => Some(sizes.iter().cloned().collect::<Vec<_>>().join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_markers() {
        let text = "<b>🧵 Zara</b>\nShirt\n📏 Sizes:\n🟢 M\n🟡 l\n🔴 XL";
        assert_eq!(available_sizes(text), set(&["M", "L"]));
    }

    #[test]
    fn test_ignores_lines_without_marker() {
        let text = "Product\n📦 Status: in stock\n🔴 S\nM";
        assert!(available_sizes(text).is_empty());
        assert!(available_sizes("").is_empty());
    }

    #[test]
    fn test_order_independent() {
        let a = "🟢 M\n🔴 S\n🟢 XL\n🟡 L";
        let b = "🟡 L\n🟢 XL\n🟢 M\n🔴 S";
        assert_eq!(available_sizes(a), available_sizes(b));
    }

    #[test]
    fn test_markup_and_bullets_are_ignored() {
        let plain = "🟢 M\n🟡 L";
        let decorated = "• 🟢 <b>M</b>\n  - <i>🟡</i> <span class=\"x\">l</span> (few left)";
        assert_eq!(available_sizes(plain), available_sizes(decorated));
    }

    #[test]
    fn test_first_word_after_marker() {
        assert_eq!(available_sizes("🟢 42 EU"), set(&["42"]));
        assert_eq!(available_sizes("🟢M"), set(&["M"]));
        assert!(available_sizes("🟢   ").is_empty());
        assert!(available_sizes("🟢 <b></b>").is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(available_sizes("🟢 M\n🟡 m\n🟢 M"), set(&["M"]));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<a href=\"x\">Jeans</a>"), "Jeans");
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn test_wanted_parse() {
        assert_eq!(WantedSizes::parse(None), WantedSizes::Any);
        assert_eq!(WantedSizes::parse(Some(" , ")), WantedSizes::Any);
        assert_eq!(
            WantedSizes::parse(Some("m, L,xl")),
            WantedSizes::Only(set(&["M", "L", "XL"]))
        );
    }

    #[test]
    fn test_wanted_matches() {
        let available = set(&["M", "S"]);
        assert!(WantedSizes::Any.matches(&available));
        assert!(!WantedSizes::Any.matches(&BTreeSet::new()));
        assert!(!WantedSizes::parse(Some("L,XL")).matches(&available));
        assert!(WantedSizes::parse(Some("S,XL")).matches(&available));
    }

    #[test]
    fn test_wanted_shown_is_sorted() {
        let available = set(&["XL", "M", "S"]);
        assert_eq!(WantedSizes::Any.shown(&available), vec!["M", "S", "XL"]);
        assert_eq!(WantedSizes::parse(Some("xl,s,l")).shown(&available), vec!["S", "XL"]);
    }
}
