//! Entity types of a Schedule of Activities record

use serde::{Deserialize, Serialize};

/// The four identified entity collections of a record.
///
/// Ticks are not listed here: they have no identity of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Activity,
    Timepoint,
    Encounter,
    ActivityGroup,
}

impl EntityKind {
    /// All kinds, in the order collections are processed.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Encounter,
        EntityKind::Timepoint,
        EntityKind::ActivityGroup,
        EntityKind::Activity,
    ];

    /// Prefix used when assigning global ids (`activity-1`, `activity-group-2`, ...)
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Timepoint => "timepoint",
            Self::Encounter => "encounter",
            Self::ActivityGroup => "activity-group",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A procedure or assessment performed during the study (a matrix row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub name: String,
}

impl Activity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A scheduled column of the matrix: a visit instance or milestone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timepoint {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Back-reference to the encounter this timepoint belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
}

impl Timepoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            encounter_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_encounter(mut self, encounter_id: impl Into<String>) -> Self {
        self.encounter_id = Some(encounter_id.into());
        self
    }
}

/// A clinical visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: String,
    pub name: String,
    /// Window label, e.g. "Day 1 ± 2"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
}

impl Encounter {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timing: None,
        }
    }

    pub fn with_timing(mut self, timing: impl Into<String>) -> Self {
        self.timing = Some(timing.into());
        self
    }
}

/// A categorical grouping of activities (e.g. "Laboratory")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityGroup {
    pub id: String,
    pub name: String,
    /// Member activity ids, in declared order, without duplicates
    #[serde(default)]
    pub activity_ids: Vec<String>,
}

impl ActivityGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            activity_ids: Vec::new(),
        }
    }

    pub fn with_member(mut self, activity_id: impl Into<String>) -> Self {
        self.add_member(activity_id);
        self
    }

    /// Add a member, keeping the set ordered and duplicate-free.
    pub fn add_member(&mut self, activity_id: impl Into<String>) {
        let activity_id = activity_id.into();
        if !self.activity_ids.contains(&activity_id) {
            self.activity_ids.push(activity_id);
        }
    }
}
