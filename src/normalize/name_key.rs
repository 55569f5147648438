//! Normalized name keys for cross-source matching
//!
//! Ids never line up across independent extraction passes, names mostly do
//! once case, punctuation and spacing are ignored.

use serde::{Deserialize, Serialize};

/// Case-insensitive, punctuation- and whitespace-normalized entity name.
///
/// `"Vital  Signs"`, `"vital-signs"` and `"VITAL SIGNS."` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameKey(String);

impl NameKey {
    /// Build a key, or `None` if nothing alphanumeric remains.
    pub fn new(raw: &str) -> Option<Self> {
        let mut key = String::with_capacity(raw.len());
        for word in raw
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if !key.is_empty() {
                key.push(' ');
            }
            key.extend(word.chars().flat_map(char::to_lowercase));
        }
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True when two optional names can denote the same entity:
/// either side is unnamed, or the keys agree.
pub fn names_compatible(a: Option<&NameKey>, b: Option<&NameKey>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}
