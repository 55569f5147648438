//! Provenance data types: source tags and per-entity / per-cell maps

use crate::record::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which source(s) contributed an entity or a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceTag {
    TextOnly,
    VisionOnly,
    Both,
}

impl SourceTag {
    /// Merge two observations of the same key.
    ///
    /// Equal tags are kept, any two distinct tags give `Both`. The operation
    /// is commutative and associative, so merge order never changes the
    /// final tag.
    pub fn combine(self, other: SourceTag) -> SourceTag {
        if self == other {
            self
        } else {
            SourceTag::Both
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextOnly => "textOnly",
            Self::VisionOnly => "visionOnly",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceTag {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "textOnly" => Ok(Self::TextOnly),
            "vision" | "visionOnly" => Ok(Self::VisionOnly),
            "both" => Ok(Self::Both),
            _ => Err(format!("unknown source tag: {}", s)),
        }
    }
}

/// Key → source tag, for one entity collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceMap(BTreeMap<String, SourceTag>);

impl ProvenanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map assigning the same tag to every key
    pub fn tagged<I, K>(keys: I, tag: SourceTag) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self(keys.into_iter().map(|k| (k.into(), tag)).collect())
    }

    /// Record one observation: new keys adopt the tag, differing tags
    /// promote the stored one to `Both`.
    pub fn record(&mut self, key: impl Into<String>, tag: SourceTag) {
        self.0
            .entry(key.into())
            .and_modify(|stored| *stored = stored.combine(tag))
            .or_insert(tag);
    }

    /// Merge another map key by key
    pub fn merge_from(&mut self, other: &ProvenanceMap) {
        for (key, tag) in &other.0 {
            self.record(key.clone(), *tag);
        }
    }

    pub fn get(&self, key: &str) -> Option<SourceTag> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SourceTag)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cell provenance: activity id → timepoint id → tag
pub type CellProvenance = BTreeMap<String, BTreeMap<String, SourceTag>>;

/// Provenance emitted next to a reconciled record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub entities: BTreeMap<EntityKind, ProvenanceMap>,
    pub cells: CellProvenance,
}

impl ProvenanceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a tagged set of entity ids into one collection's map
    pub fn merge_tagged<I, K>(&mut self, kind: EntityKind, keys: I, tag: SourceTag)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.entities
            .entry(kind)
            .or_default()
            .merge_from(&ProvenanceMap::tagged(keys, tag));
    }

    pub fn record_cell(&mut self, activity_id: &str, timepoint_id: &str, tag: SourceTag) {
        self.cells
            .entry(activity_id.to_string())
            .or_default()
            .entry(timepoint_id.to_string())
            .and_modify(|stored| *stored = stored.combine(tag))
            .or_insert(tag);
    }

    /// Merge another provenance record into this one, key by key
    pub fn merge(&mut self, other: &ProvenanceRecord) {
        for (kind, map) in &other.entities {
            self.entities.entry(*kind).or_default().merge_from(map);
        }
        for (activity, row) in &other.cells {
            for (timepoint, tag) in row {
                self.record_cell(activity, timepoint, *tag);
            }
        }
    }

    pub fn entity_tag(&self, kind: EntityKind, id: &str) -> Option<SourceTag> {
        self.entities.get(&kind).and_then(|m| m.get(id))
    }

    pub fn cell_tag(&self, activity_id: &str, timepoint_id: &str) -> Option<SourceTag> {
        self.cells
            .get(activity_id)
            .and_then(|row| row.get(timepoint_id))
            .copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }
}
