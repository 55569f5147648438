//! Normalized schedule: one instance per timepoint

use serde::{Deserialize, Serialize};

/// The activities performed at one timepoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledInstance {
    pub id: String,
    pub timepoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<String>,
    /// Sorted, duplicate-free; may be empty
    pub activity_ids: Vec<String>,
}

/// Timeline view of the tick matrix, in chronological timepoint order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTimeline {
    pub instances: Vec<ScheduledInstance>,
}

impl ScheduleTimeline {
    /// Find the instance for a timepoint
    pub fn instance_for(&self, timepoint_id: &str) -> Option<&ScheduledInstance> {
        self.instances
            .iter()
            .find(|i| i.timepoint_id == timepoint_id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
