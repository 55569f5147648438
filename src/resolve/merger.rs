//! Fragment merger: N locally-scoped fragments → one globally-keyed record
//!
//! Two phases. Declarations first: every entity of every fragment is given
//! its global id, in fragment order then collection order. References
//! second: timepoint→encounter links, group membership and ticks are
//! rewritten through the finished maps, so a fragment may refer to an
//! entity that a later fragment declares.

use super::state::{Declared, IdMapping, Reference, ResolverState};
use crate::normalize::{parse_record, MalformedFragment, Normalized};
use crate::record::{
    Activity, ActivityGroup, Encounter, EntityKind, SoaRecord, Tick, Timepoint,
};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// A fragment that was left out of the merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFragment {
    pub index: usize,
    pub reason: String,
}

/// Counters describing one merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub fragments_total: usize,
    pub fragments_merged: usize,
    pub skipped_fragments: Vec<SkippedFragment>,
    /// Entries inside usable fragments that could not be read
    pub entries_skipped: usize,
    pub matched_by_name: usize,
    pub matched_by_alias: usize,
    /// References dropped because they never resolved to a global id
    pub unresolved_references: usize,
    /// References to ids the fragment never declared, bound through
    /// another fragment's alias
    pub foreign_references: usize,
    pub entities: BTreeMap<EntityKind, usize>,
    pub ticks: usize,
}

impl MergeReport {
    pub fn fragments_skipped(&self) -> usize {
        self.skipped_fragments.len()
    }
}

/// Output of the identity resolver
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: SoaRecord,
    pub mapping: IdMapping,
    /// Which fragments asserted each global tick
    pub tick_fragments: BTreeMap<Tick, BTreeSet<usize>>,
    pub report: MergeReport,
}

/// Merges fragments into one record with global ids
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    match_by_name: bool,
    parallel_ingest: bool,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self {
            match_by_name: true,
            parallel_ingest: false,
        }
    }

    /// Merge entities of different fragments that share a normalized name
    pub fn with_name_matching(mut self, enabled: bool) -> Self {
        self.match_by_name = enabled;
        self
    }

    /// Normalize raw fragments on the rayon pool before merging
    pub fn with_parallel_ingest(mut self, enabled: bool) -> Self {
        self.parallel_ingest = enabled;
        self
    }

    /// Normalize raw fragments, skip malformed ones, and merge the rest.
    ///
    /// Normalization may run in parallel; results are always taken back in
    /// fragment order before any id is assigned.
    pub fn resolve_raw(&self, raws: &[Value]) -> Resolution {
        let parsed: Vec<Result<Normalized, MalformedFragment>> = if self.parallel_ingest {
            raws.par_iter().map(parse_record).collect()
        } else {
            raws.iter().map(parse_record).collect()
        };

        let mut report = MergeReport {
            fragments_total: raws.len(),
            ..Default::default()
        };
        let mut usable = Vec::with_capacity(parsed.len());
        for (index, result) in parsed.into_iter().enumerate() {
            match result {
                Ok(normalized) => {
                    report.entries_skipped += normalized.skipped_entries;
                    usable.push((index, normalized.record));
                }
                Err(reason) => {
                    warn!(fragment = index, %reason, "skipping malformed fragment");
                    report.skipped_fragments.push(SkippedFragment {
                        index,
                        reason: reason.to_string(),
                    });
                }
            }
        }

        let refs: Vec<(usize, &SoaRecord)> = usable.iter().map(|(i, r)| (*i, r)).collect();
        self.merge(&refs, report)
    }

    /// Merge already-normalized fragments; fragment indices follow slice order.
    pub fn resolve(&self, fragments: &[SoaRecord]) -> Resolution {
        let refs: Vec<(usize, &SoaRecord)> = fragments.iter().enumerate().collect();
        let report = MergeReport {
            fragments_total: fragments.len(),
            ..Default::default()
        };
        self.merge(&refs, report)
    }

    fn merge(&self, fragments: &[(usize, &SoaRecord)], mut report: MergeReport) -> Resolution {
        let mut state = ResolverState::new(self.match_by_name);
        let mut out = Collector::default();

        // Phase 1: declarations
        for &(fi, fragment) in fragments {
            for enc in &fragment.encounters {
                let declared = state.declare(fi, EntityKind::Encounter, &enc.id, &enc.name);
                count_match(&mut report, &declared);
                out.encounter(declared.global_id(), enc);
            }
            for tp in &fragment.planned_timepoints {
                let declared = state.declare(fi, EntityKind::Timepoint, &tp.id, &tp.name);
                count_match(&mut report, &declared);
                out.timepoint(declared.global_id(), tp);
            }
            for group in &fragment.activity_groups {
                let declared =
                    state.declare(fi, EntityKind::ActivityGroup, &group.id, &group.name);
                count_match(&mut report, &declared);
                out.group(declared.global_id(), group);
            }
            for activity in &fragment.activities {
                let declared =
                    state.declare(fi, EntityKind::Activity, &activity.id, &activity.name);
                count_match(&mut report, &declared);
                out.activity(declared.global_id(), activity);
            }
        }

        // Phase 2: references
        let mut tick_fragments: BTreeMap<Tick, BTreeSet<usize>> = BTreeMap::new();
        for &(fi, fragment) in fragments {
            for tp in &fragment.planned_timepoints {
                let Some(local_enc) = tp.encounter_id.as_deref() else {
                    continue;
                };
                let Some(tp_global) = state.lookup(fi, EntityKind::Timepoint, &tp.id) else {
                    continue;
                };
                match follow(&state, &mut report, fi, EntityKind::Encounter, local_enc) {
                    Some(enc_global) => out.link_encounter(tp_global, enc_global),
                    None => {
                        report.unresolved_references += 1;
                        debug!(fragment = fi, timepoint = %tp.id, encounter = local_enc, "unresolved encounter reference dropped");
                    }
                }
            }

            for group in &fragment.activity_groups {
                let Some(group_global) = state.lookup(fi, EntityKind::ActivityGroup, &group.id)
                else {
                    continue;
                };
                for member in &group.activity_ids {
                    match follow(&state, &mut report, fi, EntityKind::Activity, member) {
                        Some(activity_global) => out.add_member(group_global, activity_global),
                        None => {
                            report.unresolved_references += 1;
                            debug!(fragment = fi, group = %group.id, activity = %member, "unresolved group member dropped");
                        }
                    }
                }
            }

            for tick in fragment.ticks() {
                let activity =
                    follow(&state, &mut report, fi, EntityKind::Activity, &tick.activity_id);
                let timepoint =
                    follow(&state, &mut report, fi, EntityKind::Timepoint, &tick.timepoint_id);
                match (activity, timepoint) {
                    (Some(a), Some(t)) => {
                        let global = Tick::new(a, t);
                        out.record.add_tick(global.clone());
                        tick_fragments.entry(global).or_default().insert(fi);
                    }
                    _ => {
                        report.unresolved_references += 1;
                        debug!(fragment = fi, %tick, "tick with unresolved endpoint dropped");
                    }
                }
            }
        }

        let record = out.record;
        report.fragments_merged = fragments.len();
        for kind in EntityKind::ALL {
            report.entities.insert(kind, record.entity_count(kind));
        }
        report.ticks = record.ticks().len();

        info!(
            merged = report.fragments_merged,
            skipped = report.fragments_skipped(),
            activities = record.activities.len(),
            timepoints = record.planned_timepoints.len(),
            ticks = report.ticks,
            unresolved = report.unresolved_references,
            foreign = report.foreign_references,
            "fragments merged"
        );

        Resolution {
            record,
            mapping: state.into_mapping(),
            tick_fragments,
            report,
        }
    }
}

/// Follow a reference made by fragment `fi`, counting the ones that bind
/// to an entity the fragment never declared.
fn follow<'s>(
    state: &'s ResolverState,
    report: &mut MergeReport,
    fi: usize,
    kind: EntityKind,
    local_id: &str,
) -> Option<&'s str> {
    match state.resolve_ref(fi, kind, local_id)? {
        Reference::Own(global) => Some(global),
        Reference::Foreign(global) => {
            report.foreign_references += 1;
            debug!(fragment = fi, %kind, local_id, global, "reference bound to another fragment's entity");
            Some(global)
        }
    }
}

fn count_match(report: &mut MergeReport, declared: &Declared) {
    match declared {
        Declared::ByName(_) => report.matched_by_name += 1,
        Declared::ByAlias(_) => report.matched_by_alias += 1,
        Declared::Repeated(_) | Declared::Fresh(_) => {}
    }
}

/// Accumulates globally-keyed entities in first-declaration order.
///
/// The first occurrence of an entity supplies its name; later occurrences
/// only fill fields that are still empty.
#[derive(Default)]
struct Collector {
    record: SoaRecord,
    slots: HashMap<(EntityKind, String), usize>,
}

impl Collector {
    fn slot(&mut self, kind: EntityKind, global: &str, len: usize) -> (usize, bool) {
        match self.slots.get(&(kind, global.to_string())) {
            Some(&i) => (i, false),
            None => {
                self.slots.insert((kind, global.to_string()), len);
                (len, true)
            }
        }
    }

    fn activity(&mut self, global: &str, src: &Activity) {
        let (i, new) = self.slot(EntityKind::Activity, global, self.record.activities.len());
        if new {
            self.record.activities.push(Activity::new(global, src.name.clone()));
        } else {
            fill_name(&mut self.record.activities[i].name, &src.name);
        }
    }

    fn timepoint(&mut self, global: &str, src: &Timepoint) {
        let len = self.record.planned_timepoints.len();
        let (i, new) = self.slot(EntityKind::Timepoint, global, len);
        if new {
            let mut tp = Timepoint::new(global, src.name.clone());
            tp.description = src.description.clone();
            self.record.planned_timepoints.push(tp);
        } else {
            let tp = &mut self.record.planned_timepoints[i];
            fill_name(&mut tp.name, &src.name);
            if tp.description.is_none() {
                tp.description = src.description.clone();
            }
        }
    }

    fn encounter(&mut self, global: &str, src: &Encounter) {
        let (i, new) = self.slot(EntityKind::Encounter, global, self.record.encounters.len());
        if new {
            let mut enc = Encounter::new(global, src.name.clone());
            enc.timing = src.timing.clone();
            self.record.encounters.push(enc);
        } else {
            let enc = &mut self.record.encounters[i];
            fill_name(&mut enc.name, &src.name);
            if enc.timing.is_none() {
                enc.timing = src.timing.clone();
            }
        }
    }

    fn group(&mut self, global: &str, src: &ActivityGroup) {
        let len = self.record.activity_groups.len();
        let (i, new) = self.slot(EntityKind::ActivityGroup, global, len);
        if new {
            self.record
                .activity_groups
                .push(ActivityGroup::new(global, src.name.clone()));
        } else {
            fill_name(&mut self.record.activity_groups[i].name, &src.name);
        }
    }

    fn link_encounter(&mut self, timepoint: &str, encounter: &str) {
        if let Some(&i) = self.slots.get(&(EntityKind::Timepoint, timepoint.to_string())) {
            let tp = &mut self.record.planned_timepoints[i];
            if tp.encounter_id.is_none() {
                tp.encounter_id = Some(encounter.to_string());
            }
        }
    }

    fn add_member(&mut self, group: &str, activity: &str) {
        if let Some(&i) = self.slots.get(&(EntityKind::ActivityGroup, group.to_string())) {
            self.record.activity_groups[i].add_member(activity);
        }
    }
}

fn fill_name(current: &mut String, incoming: &str) {
    if current.trim().is_empty() && !incoming.trim().is_empty() {
        *current = incoming.to_string();
    }
}
