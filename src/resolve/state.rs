//! Resolver state: id allocation, canonical and alias maps
//!
//! All of this is an explicit value owned by one merge run. Nothing is
//! global, so two merges never interfere and each is reproducible.

use super::alias::alias_key;
use crate::normalize::{names_compatible, NameKey};
use crate::record::EntityKind;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Per-kind sequence counters for global ids
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: HashMap<EntityKind, usize>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id for a kind: `activity-1`, `activity-2`, ...
    pub fn next(&mut self, kind: EntityKind) -> String {
        let n = self.counters.entry(kind).or_insert(0);
        *n += 1;
        format!("{}-{}", kind.prefix(), n)
    }

    /// How many ids have been issued for a kind
    pub fn issued(&self, kind: EntityKind) -> usize {
        self.counters.get(&kind).copied().unwrap_or(0)
    }
}

/// A locally-scoped id: which fragment, which collection, which id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRef {
    pub fragment: usize,
    pub kind: EntityKind,
    pub local_id: String,
}

impl LocalRef {
    pub fn new(fragment: usize, kind: EntityKind, local_id: impl Into<String>) -> Self {
        Self {
            fragment,
            kind,
            local_id: local_id.into(),
        }
    }
}

/// One row of the serialized mapping
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry<'a> {
    #[serde(flatten)]
    pub local: &'a LocalRef,
    pub global_id: &'a str,
}

/// Every (fragment, local id) → assigned global id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    entries: BTreeMap<LocalRef, String>,
}

impl IdMapping {
    pub fn get(&self, fragment: usize, kind: EntityKind, local_id: &str) -> Option<&str> {
        self.entries
            .get(&LocalRef::new(fragment, kind, local_id))
            .map(String::as_str)
    }

    /// Fragments that declared the given global entity
    pub fn fragments_of(&self, kind: EntityKind, global_id: &str) -> BTreeSet<usize> {
        self.entries
            .iter()
            .filter(|(local, global)| local.kind == kind && global.as_str() == global_id)
            .map(|(local, _)| local.fragment)
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = MappingEntry<'_>> {
        self.entries.iter().map(|(local, global)| MappingEntry {
            local,
            global_id: global,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, local: LocalRef, global_id: String) {
        self.entries.insert(local, global_id);
    }
}

impl Serialize for IdMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries())
    }
}

/// How a declared entity was matched to a global id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    /// Same local id already seen in this fragment
    Repeated(String),
    /// Matched an entity from an earlier fragment by normalized name
    ByName(String),
    /// Matched an entity from an earlier fragment by id alias
    ByAlias(String),
    /// New entity
    Fresh(String),
}

impl Declared {
    pub fn global_id(&self) -> &str {
        match self {
            Self::Repeated(g) | Self::ByName(g) | Self::ByAlias(g) | Self::Fresh(g) => g,
        }
    }
}

/// Where a fragment's reference landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// An entity the fragment declared itself, by local id or alias
    Own(&'a str),
    /// An entity only other fragments declared, reached through its alias
    Foreign(&'a str),
}

impl<'a> Reference<'a> {
    pub fn global_id(&self) -> &'a str {
        match *self {
            Self::Own(g) | Self::Foreign(g) => g,
        }
    }
}

/// Identity state threaded through one merge
#[derive(Debug, Default)]
pub struct ResolverState {
    allocator: IdAllocator,
    mapping: IdMapping,
    aliases: HashMap<(EntityKind, String), String>,
    names: HashMap<(EntityKind, NameKey), String>,
    global_names: HashMap<String, NameKey>,
    /// Global ids already bound to some local id of a fragment
    claimed: HashSet<(usize, String)>,
    match_by_name: bool,
}

impl ResolverState {
    pub fn new(match_by_name: bool) -> Self {
        Self {
            match_by_name,
            ..Default::default()
        }
    }

    /// Assign (or find) the global id for an entity declared by a fragment.
    ///
    /// Order: repeated local id, name match, alias match, fresh id. A global
    /// id already claimed by the same fragment is never reused for another
    /// of its local ids, so two distinct entities of one fragment stay
    /// distinct even when they share a name.
    pub fn declare(
        &mut self,
        fragment: usize,
        kind: EntityKind,
        local_id: &str,
        name: &str,
    ) -> Declared {
        let local = LocalRef::new(fragment, kind, local_id);
        if let Some(g) = self.mapping.entries.get(&local) {
            return Declared::Repeated(g.clone());
        }

        let name_key = NameKey::new(name);
        let alias = alias_key(local_id);

        let by_name = if self.match_by_name {
            name_key
                .as_ref()
                .and_then(|n| self.names.get(&(kind, n.clone())))
                .filter(|g| self.is_free(fragment, g))
                .cloned()
        } else {
            None
        };
        let by_alias = self
            .aliases
            .get(&(kind, alias.clone()))
            .filter(|g| {
                self.is_free(fragment, g)
                    && names_compatible(name_key.as_ref(), self.global_names.get(g.as_str()))
            })
            .cloned();

        let outcome = match (by_name, by_alias) {
            (Some(g), _) => Declared::ByName(g),
            (None, Some(g)) => Declared::ByAlias(g),
            (None, None) => Declared::Fresh(self.allocator.next(kind)),
        };

        let global = outcome.global_id().to_string();
        self.mapping.insert(local, global.clone());
        self.aliases
            .entry((kind, alias))
            .or_insert_with(|| global.clone());
        if let Some(n) = name_key {
            self.names
                .entry((kind, n.clone()))
                .or_insert_with(|| global.clone());
            self.global_names.entry(global.clone()).or_insert(n);
        }
        self.claimed.insert((fragment, global));
        outcome
    }

    /// Resolve a reference made by a fragment: its own declarations first,
    /// then any alias seen so far. `None` means the reference is dangling.
    pub fn lookup(&self, fragment: usize, kind: EntityKind, local_id: &str) -> Option<&str> {
        self.resolve_ref(fragment, kind, local_id)
            .map(|r| r.global_id())
    }

    /// Like [`lookup`](Self::lookup), but tells apart references that only
    /// resolve through another fragment's declaration.
    pub fn resolve_ref(
        &self,
        fragment: usize,
        kind: EntityKind,
        local_id: &str,
    ) -> Option<Reference<'_>> {
        if let Some(g) = self.mapping.get(fragment, kind, local_id) {
            return Some(Reference::Own(g));
        }
        let g = self.aliases.get(&(kind, alias_key(local_id)))?.as_str();
        if self.is_free(fragment, g) {
            Some(Reference::Foreign(g))
        } else {
            Some(Reference::Own(g))
        }
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    pub fn into_mapping(self) -> IdMapping {
        self.mapping
    }

    fn is_free(&self, fragment: usize, global_id: &str) -> bool {
        !self.claimed.contains(&(fragment, global_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_counts_per_kind() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next(EntityKind::Activity), "activity-1");
        assert_eq!(ids.next(EntityKind::Activity), "activity-2");
        assert_eq!(ids.next(EntityKind::ActivityGroup), "activity-group-1");
        assert_eq!(ids.issued(EntityKind::Activity), 2);
        assert_eq!(ids.issued(EntityKind::Encounter), 0);
    }

    #[test]
    fn alias_collapses_across_fragments() {
        let mut state = ResolverState::new(true);
        let first = state.declare(0, EntityKind::Encounter, "encounter-3", "Visit 3");
        let second = state.declare(1, EntityKind::Encounter, "enc_3", "");
        assert_eq!(first, Declared::Fresh("encounter-1".into()));
        assert_eq!(second, Declared::ByAlias("encounter-1".into()));
        assert_eq!(state.allocator().issued(EntityKind::Encounter), 1);
    }

    #[test]
    fn alias_with_conflicting_name_is_not_merged() {
        let mut state = ResolverState::new(true);
        state.declare(0, EntityKind::Activity, "act1", "ECG");
        let other = state.declare(1, EntityKind::Activity, "act1", "Urinalysis");
        assert_eq!(other, Declared::Fresh("activity-2".into()));
        // The fragment's own declaration wins over the alias map
        assert_eq!(state.lookup(1, EntityKind::Activity, "act1"), Some("activity-2"));
        assert_eq!(state.lookup(0, EntityKind::Activity, "act1"), Some("activity-1"));
    }

    #[test]
    fn name_match_across_fragments() {
        let mut state = ResolverState::new(true);
        state.declare(0, EntityKind::Activity, "A1", "Vital Signs");
        let second = state.declare(1, EntityKind::Activity, "act-7", "vital signs");
        assert_eq!(second, Declared::ByName("activity-1".into()));
    }

    #[test]
    fn name_match_can_be_disabled() {
        let mut state = ResolverState::new(false);
        state.declare(0, EntityKind::Activity, "A1", "Vital Signs");
        let second = state.declare(1, EntityKind::Activity, "act-7", "Vital Signs");
        assert_eq!(second, Declared::Fresh("activity-2".into()));
    }

    #[test]
    fn same_fragment_duplicates_by_name_stay_distinct() {
        let mut state = ResolverState::new(true);
        let a = state.declare(0, EntityKind::Timepoint, "t1", "Day 1");
        let b = state.declare(0, EntityKind::Timepoint, "t2", "Day 1");
        assert_ne!(a.global_id(), b.global_id());
        assert_eq!(
            state.declare(0, EntityKind::Timepoint, "t1", "Day 1"),
            Declared::Repeated(a.global_id().to_string())
        );
    }

    #[test]
    fn lookup_falls_back_to_alias_and_misses_unknown() {
        let mut state = ResolverState::new(true);
        state.declare(0, EntityKind::Timepoint, "tp1", "Screening");
        assert_eq!(state.lookup(3, EntityKind::Timepoint, "timepoint-1"), Some("timepoint-1"));
        assert_eq!(state.lookup(3, EntityKind::Timepoint, "tp9"), None);
        assert_eq!(state.lookup(0, EntityKind::Encounter, "tp1"), None);
    }

    #[test]
    fn undeclared_id_resolves_as_foreign() {
        let mut state = ResolverState::new(true);
        state.declare(0, EntityKind::Activity, "act3", "ECG");
        state.declare(1, EntityKind::Activity, "act1", "Labs");
        state.declare(1, EntityKind::Encounter, "enc_3", "");

        assert_eq!(
            state.resolve_ref(0, EntityKind::Activity, "act3"),
            Some(Reference::Own("activity-1"))
        );
        // Fragment 1 never declared act3
        assert_eq!(
            state.resolve_ref(1, EntityKind::Activity, "act3"),
            Some(Reference::Foreign("activity-1"))
        );
        // ENC3 is another spelling of the fragment's own enc_3
        assert_eq!(
            state.resolve_ref(1, EntityKind::Encounter, "ENC3"),
            Some(Reference::Own("encounter-1"))
        );
        assert_eq!(state.resolve_ref(1, EntityKind::Activity, "act9"), None);
    }

    #[test]
    fn mapping_serializes_as_flat_entries() {
        let mut state = ResolverState::new(true);
        state.declare(0, EntityKind::Activity, "a1", "ECG");
        let json = serde_json::to_value(state.into_mapping()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "fragment": 0, "kind": "activity", "localId": "a1", "globalId": "activity-1" }
            ])
        );
    }
}
