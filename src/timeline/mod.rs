//! Schedule timeline derivation
//!
//! Rebuilds the "one group of activities per timepoint" view from the tick
//! matrix. Always re-run after enforcement so the view matches the pruned
//! ticks.

use crate::record::{chronological, natural_cmp, ScheduleTimeline, ScheduledInstance, SoaRecord};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// One instance per timepoint, in chronological order.
///
/// Timepoints without ticks still get an instance with no activities. Ticks
/// pointing at a timepoint the record does not declare are ignored.
pub fn derive_timeline(record: &SoaRecord) -> ScheduleTimeline {
    let mut by_timepoint: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for tick in record.ticks() {
        by_timepoint
            .entry(tick.timepoint_id.as_str())
            .or_default()
            .insert(tick.activity_id.as_str());
    }

    let instances: Vec<ScheduledInstance> = chronological(&record.planned_timepoints)
        .into_iter()
        .enumerate()
        .map(|(i, tp)| {
            let mut activity_ids: Vec<String> = by_timepoint
                .get(tp.id.as_str())
                .map(|ids| ids.iter().map(|id| id.to_string()).collect())
                .unwrap_or_default();
            activity_ids.sort_by(|a, b| natural_cmp(a, b));
            ScheduledInstance {
                id: format!("instance-{}", i + 1),
                timepoint_id: tp.id.clone(),
                encounter_id: tp.encounter_id.clone(),
                activity_ids,
            }
        })
        .collect();

    let empty = instances.iter().filter(|i| i.activity_ids.is_empty()).count();
    debug!(instances = instances.len(), empty, "schedule timeline derived");
    ScheduleTimeline { instances }
}

/// Replace the record's timeline with a fresh derivation
pub fn attach_timeline(record: &mut SoaRecord) {
    let timeline = derive_timeline(record);
    record.schedule_timeline = Some(timeline);
}
