//! Per-source lookup tables
//!
//! Built once per raw source and shared by tick confirmation and
//! provenance alignment, so names are normalized exactly once.

use super::name_key::{names_compatible, NameKey};
use crate::record::{EntityKind, SoaRecord, Tick};
use std::collections::{HashMap, HashSet};

/// How a source confirmed a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The exact (activity id, timepoint id) pair is present
    ById,
    /// Present as (activity name, timepoint id) under a different activity id
    ByName,
}

/// Id, name and tick lookups over one source record
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    entity_ids: HashMap<EntityKind, HashSet<String>>,
    activity_names: HashMap<String, NameKey>,
    activities_by_name: HashMap<NameKey, Vec<String>>,
    timepoints_by_name: HashMap<NameKey, Vec<String>>,
    tick_ids: HashSet<Tick>,
    tick_names: HashSet<(NameKey, String)>,
    ticks_per_timepoint: HashMap<String, usize>,
    ticked_activity_ids: HashSet<String>,
    ticked_activity_names: HashSet<NameKey>,
    structureless: bool,
}

impl SourceIndex {
    pub fn build(record: &SoaRecord) -> Self {
        let mut index = Self {
            structureless: record.is_structureless(),
            ..Default::default()
        };

        for kind in EntityKind::ALL {
            let ids = record.ids(kind).into_iter().map(str::to_string).collect();
            index.entity_ids.insert(kind, ids);
        }

        for activity in &record.activities {
            if let Some(key) = NameKey::new(&activity.name) {
                index
                    .activities_by_name
                    .entry(key.clone())
                    .or_default()
                    .push(activity.id.clone());
                index.activity_names.insert(activity.id.clone(), key);
            }
        }
        for tp in &record.planned_timepoints {
            if let Some(key) = NameKey::new(&tp.name) {
                index
                    .timepoints_by_name
                    .entry(key)
                    .or_default()
                    .push(tp.id.clone());
            }
        }

        for tick in record.ticks() {
            index.tick_ids.insert(tick.clone());
            *index
                .ticks_per_timepoint
                .entry(tick.timepoint_id.clone())
                .or_insert(0) += 1;
            index.ticked_activity_ids.insert(tick.activity_id.clone());
            if let Some(key) = index.activity_names.get(&tick.activity_id).cloned() {
                index
                    .tick_names
                    .insert((key.clone(), tick.timepoint_id.clone()));
                index.ticked_activity_names.insert(key);
            }
        }

        index
    }

    /// No timepoints and no ticks: the source cannot constrain the matrix
    pub fn is_structureless(&self) -> bool {
        self.structureless
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.entity_ids
            .get(&kind)
            .is_some_and(|ids| ids.contains(id))
    }

    pub fn has_timepoint(&self, id: &str) -> bool {
        self.contains(EntityKind::Timepoint, id)
    }

    /// Normalized name of one of this source's activities
    pub fn activity_name(&self, activity_id: &str) -> Option<&NameKey> {
        self.activity_names.get(activity_id)
    }

    /// Activity ids in this source carrying the given name
    pub fn activities_named(&self, name: &NameKey) -> &[String] {
        self.activities_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Timepoint ids in this source carrying the given name
    pub fn timepoints_named(&self, name: &NameKey) -> &[String] {
        self.timepoints_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_tick(&self, tick: &Tick) -> bool {
        self.tick_ids.contains(tick)
    }

    /// Does this source assert the tick, by id or by activity name?
    ///
    /// Activity ids are numbered per pass, so an id match only counts when
    /// this source's activity under that id carries a compatible name.
    pub fn confirms(&self, tick: &Tick, activity_name: Option<&NameKey>) -> Option<Confirmation> {
        if self.tick_ids.contains(tick) && self.same_activity(&tick.activity_id, activity_name) {
            return Some(Confirmation::ById);
        }
        let name = activity_name?;
        self.tick_names
            .contains(&(name.clone(), tick.timepoint_id.clone()))
            .then_some(Confirmation::ByName)
    }

    /// Number of ticks this source produced in a timepoint's column
    pub fn ticks_at(&self, timepoint_id: &str) -> usize {
        self.ticks_per_timepoint
            .get(timepoint_id)
            .copied()
            .unwrap_or(0)
    }

    /// Did this source tick the activity's row anywhere?
    pub fn ticked_activity(&self, activity_id: &str, activity_name: Option<&NameKey>) -> bool {
        (self.ticked_activity_ids.contains(activity_id)
            && self.same_activity(activity_id, activity_name))
            || activity_name.is_some_and(|n| self.ticked_activity_names.contains(n))
    }

    /// Could this source's activity `activity_id` be the activity named
    /// `activity_name`? Unnamed on either side counts as yes.
    pub fn same_activity(&self, activity_id: &str, activity_name: Option<&NameKey>) -> bool {
        names_compatible(activity_name, self.activity_names.get(activity_id))
    }
}
