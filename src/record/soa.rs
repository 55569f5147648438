//! SoaRecord: one complete or partial Schedule of Activities

use super::entity::{Activity, ActivityGroup, Encounter, EntityKind, Timepoint};
use super::schedule::ScheduleTimeline;
use super::tick::Tick;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Schema version written when no other version is configured
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

/// The activity × timepoint matrix with its supporting entities.
///
/// Collections keep insertion order; ids are unique within each collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaRecord {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub planned_timepoints: Vec<Timepoint>,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
    #[serde(default)]
    pub activity_groups: Vec<ActivityGroup>,
    /// The ticks
    #[serde(default)]
    pub activity_timepoints: Vec<Tick>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_timeline: Option<ScheduleTimeline>,
}

impl SoaRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_timepoint(mut self, timepoint: Timepoint) -> Self {
        self.planned_timepoints.push(timepoint);
        self
    }

    pub fn with_encounter(mut self, encounter: Encounter) -> Self {
        self.encounters.push(encounter);
        self
    }

    pub fn with_group(mut self, group: ActivityGroup) -> Self {
        self.activity_groups.push(group);
        self
    }

    pub fn with_tick(mut self, activity_id: &str, timepoint_id: &str) -> Self {
        self.add_tick(Tick::new(activity_id, timepoint_id));
        self
    }

    /// Add a tick unless the same pair is already present.
    ///
    /// Returns true if the tick was new.
    pub fn add_tick(&mut self, tick: Tick) -> bool {
        if self.activity_timepoints.contains(&tick) {
            return false;
        }
        self.activity_timepoints.push(tick);
        true
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.activity_timepoints
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn timepoint(&self, id: &str) -> Option<&Timepoint> {
        self.planned_timepoints.iter().find(|t| t.id == id)
    }

    pub fn encounter(&self, id: &str) -> Option<&Encounter> {
        self.encounters.iter().find(|e| e.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&ActivityGroup> {
        self.activity_groups.iter().find(|g| g.id == id)
    }

    /// Ids of one entity collection, in declared order
    pub fn ids(&self, kind: EntityKind) -> Vec<&str> {
        match kind {
            EntityKind::Activity => self.activities.iter().map(|e| e.id.as_str()).collect(),
            EntityKind::Timepoint => self
                .planned_timepoints
                .iter()
                .map(|e| e.id.as_str())
                .collect(),
            EntityKind::Encounter => self.encounters.iter().map(|e| e.id.as_str()).collect(),
            EntityKind::ActivityGroup => self
                .activity_groups
                .iter()
                .map(|e| e.id.as_str())
                .collect(),
        }
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Activity => self.activities.len(),
            EntityKind::Timepoint => self.planned_timepoints.len(),
            EntityKind::Encounter => self.encounters.len(),
            EntityKind::ActivityGroup => self.activity_groups.len(),
        }
    }

    /// True when the record carries no timeline content at all
    pub fn is_structureless(&self) -> bool {
        self.planned_timepoints.is_empty() && self.activity_timepoints.is_empty()
    }

    /// Every reference that points at a missing entity, as human-readable
    /// descriptions. Empty means the record is referentially intact.
    pub fn dangling_references(&self) -> Vec<String> {
        let activities: HashSet<&str> = self.ids(EntityKind::Activity).into_iter().collect();
        let timepoints: HashSet<&str> = self.ids(EntityKind::Timepoint).into_iter().collect();
        let encounters: HashSet<&str> = self.ids(EntityKind::Encounter).into_iter().collect();

        let mut problems = Vec::new();
        for tick in &self.activity_timepoints {
            if !activities.contains(tick.activity_id.as_str()) {
                problems.push(format!("tick {} → missing activity", tick));
            }
            if !timepoints.contains(tick.timepoint_id.as_str()) {
                problems.push(format!("tick {} → missing timepoint", tick));
            }
        }
        for tp in &self.planned_timepoints {
            if let Some(ref enc) = tp.encounter_id {
                if !encounters.contains(enc.as_str()) {
                    problems.push(format!("timepoint {} → missing encounter {}", tp.id, enc));
                }
            }
        }
        for group in &self.activity_groups {
            for member in &group.activity_ids {
                if !activities.contains(member.as_str()) {
                    problems.push(format!("group {} → missing activity {}", group.id, member));
                }
            }
        }
        problems
    }
}

/// Versioned container around a record, as read from and written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEnvelope {
    pub schema_version: String,
    pub timeline: SoaRecord,
}

impl RecordEnvelope {
    pub fn new(schema_version: impl Into<String>, timeline: SoaRecord) -> Self {
        Self {
            schema_version: schema_version.into(),
            timeline,
        }
    }
}

impl From<SoaRecord> for RecordEnvelope {
    fn from(timeline: SoaRecord) -> Self {
        Self::new(DEFAULT_SCHEMA_VERSION, timeline)
    }
}
