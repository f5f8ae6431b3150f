//! Requirement-spec parser.
//!
//! Grammar: segments separated by `|`; each segment is an optional category
//! prefix (`ops:`, `settings:`, `keys:`, `voices:`, with accepted synonyms)
//! followed by a comma-separated item list. A segment without a recognized
//! prefix is an `ops` segment.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Parsed requirements, one set per category.
///
/// `BTreeSet` gives deduplication and the lexicographic iteration order the
/// evaluator relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet {
    pub operations: BTreeSet<String>,
    pub settings: BTreeSet<String>,
    pub keys: BTreeSet<String>,
    pub voices: BTreeSet<String>,
}

/// Accepted prefixes per category, lowercase, colon included.
const OPS_PREFIXES: &[&str] = &["ops:", "op:", "operations:"];
const SETTINGS_PREFIXES: &[&str] = &["settings:", "setting:", "set:"];
const KEYS_PREFIXES: &[&str] = &["keys:", "key:"];
const VOICES_PREFIXES: &[&str] = &["voices:", "voice:"];

impl RequirementSet {
    /// Parse a requirement spec.
    ///
    /// Whitespace around segments and items is trimmed, empty items are
    /// dropped, and an empty or whitespace-only spec yields an empty set.
    /// Parsing never fails.
    pub fn parse(spec: &str) -> Self {
        let mut set = Self::default();
        for segment in spec.split('|').map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            let lower = segment.to_lowercase();
            if let Some(rest) = strip_any_prefix(segment, &lower, OPS_PREFIXES) {
                extend_items(&mut set.operations, rest);
            } else if let Some(rest) = strip_any_prefix(segment, &lower, SETTINGS_PREFIXES) {
                extend_items(&mut set.settings, rest);
            } else if let Some(rest) = strip_any_prefix(segment, &lower, KEYS_PREFIXES) {
                extend_items(&mut set.keys, rest);
            } else if let Some(rest) = strip_any_prefix(segment, &lower, VOICES_PREFIXES) {
                extend_items(&mut set.voices, rest);
            } else {
                // No recognized prefix: the whole segment is ops items.
                extend_items(&mut set.operations, segment);
            }
        }
        set
    }

    /// True when no category holds any requirement.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
            && self.settings.is_empty()
            && self.keys.is_empty()
            && self.voices.is_empty()
    }

    /// Total number of requirements across all categories.
    pub fn len(&self) -> usize {
        self.operations.len() + self.settings.len() + self.keys.len() + self.voices.len()
    }
}

/// Strip the first matching prefix, case-insensitively, returning the item
/// list that follows it.
fn strip_any_prefix<'a>(segment: &'a str, lower: &str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes
        .iter()
        .find(|p| lower.starts_with(*p))
        .map(|p| &segment[p.len()..])
}

/// Split a comma-separated item list into a set, trimming whitespace and
/// dropping empties.
fn extend_items(target: &mut BTreeSet<String>, items: &str) {
    target.extend(
        items
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string),
    );
}
