//! Category sanitization. Rejected names are dropped silently; only an empty
//! resulting set is reported to the caller.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const MIN_CHARS: usize = 3;
const MAX_CHARS: usize = 40;

/// Letters (any script, accents included), digits, spaces, apostrophes and hyphens.
static CATEGORY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N} '’\-]+$").unwrap());

/// A trimmed, validated category name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapses runs of whitespace to a single space and trims both ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the cleaned name, or `None` if it cannot be a category.
/// Never corrects a name beyond whitespace collapsing.
pub fn sanitize_category(raw: &str) -> Option<CategoryName> {
    let cleaned = collapse_whitespace(raw);
    let len = cleaned.chars().count();
    if !(MIN_CHARS..=MAX_CHARS).contains(&len) {
        return None;
    }
    if !CATEGORY_CHARS.is_match(&cleaned) {
        return None;
    }
    Some(CategoryName(cleaned))
}

/// Ordered, de-duplicated, non-empty set of categories for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    names: Vec<CategoryName>,
}

impl CategorySet {
    /// Sanitizes every raw name, drops failures and duplicates.
    /// Returns `None` when nothing survives.
    pub fn from_raw<S: AsRef<str>>(raw: &[S]) -> Option<Self> {
        let mut names: Vec<CategoryName> = Vec::new();
        for name in raw.iter().filter_map(|r| sanitize_category(r.as_ref())) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            None
        } else {
            Some(Self { names })
        }
    }

    /// Exact member lookup after whitespace collapsing. Case and accents must match.
    pub fn find(&self, candidate: &str) -> Option<&CategoryName> {
        let cleaned = collapse_whitespace(candidate);
        self.names.iter().find(|n| n.as_str() == cleaned)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
