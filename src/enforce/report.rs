//! What the enforcer removed, and why

use crate::record::{EntityKind, Tick};
use serde::Serialize;
use std::collections::BTreeMap;

/// Why a tick was removed from the reconciled record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TickDropReason {
    /// Neither source asserts the pair under any id or name alignment
    OutsideUnion,
    /// Only text asserts it, in a column vision examined
    SupersededByVision,
    /// A text-only early tick for a row vision placed elsewhere
    AntiSmear,
    /// An endpoint did not survive entity filtering
    DanglingReference,
}

impl std::fmt::Display for TickDropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutsideUnion => write!(f, "outside union"),
            Self::SupersededByVision => write!(f, "superseded by vision"),
            Self::AntiSmear => write!(f, "anti-smear"),
            Self::DanglingReference => write!(f, "dangling reference"),
        }
    }
}

/// One removed tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTick {
    #[serde(flatten)]
    pub tick: Tick,
    pub reason: TickDropReason,
}

/// Counters for one enforcement run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementReport {
    /// Entities removed because no source declares their id
    pub entities_dropped: BTreeMap<EntityKind, usize>,
    pub ticks_dropped: BTreeMap<TickDropReason, usize>,
    /// Encounter links and group members cleared by the integrity sweep
    pub references_cleared: usize,
    pub ticks_kept: usize,
    /// The proposal was built from the sources rather than supplied
    pub union_proposal: bool,
    pub structureless_sources: Vec<String>,
    pub dropped: Vec<DroppedTick>,
}

impl EnforcementReport {
    pub(crate) fn drop_entity(&mut self, kind: EntityKind) {
        *self.entities_dropped.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn drop_tick(&mut self, tick: Tick, reason: TickDropReason) {
        *self.ticks_dropped.entry(reason).or_insert(0) += 1;
        self.dropped.push(DroppedTick { tick, reason });
    }

    pub fn ticks_dropped_for(&self, reason: TickDropReason) -> usize {
        self.ticks_dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn entities_dropped_for(&self, kind: EntityKind) -> usize {
        self.entities_dropped.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_ticks_dropped(&self) -> usize {
        self.ticks_dropped.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_by_reason() {
        let mut report = EnforcementReport::default();
        report.drop_tick(Tick::new("a1", "t1"), TickDropReason::AntiSmear);
        report.drop_tick(Tick::new("a2", "t1"), TickDropReason::AntiSmear);
        report.drop_tick(Tick::new("a3", "t9"), TickDropReason::OutsideUnion);
        report.drop_entity(EntityKind::Encounter);

        assert_eq!(report.ticks_dropped_for(TickDropReason::AntiSmear), 2);
        assert_eq!(report.ticks_dropped_for(TickDropReason::DanglingReference), 0);
        assert_eq!(report.total_ticks_dropped(), 3);
        assert_eq!(report.entities_dropped_for(EntityKind::Encounter), 1);
    }

    #[test]
    fn serializes_reason_keys_camel_case() {
        let mut report = EnforcementReport::default();
        report.drop_tick(Tick::new("a1", "t1"), TickDropReason::SupersededByVision);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ticksDropped"]["supersededByVision"], 1);
        assert_eq!(
            json["dropped"][0],
            serde_json::json!({
                "activityId": "a1",
                "timepointId": "t1",
                "reason": "supersededByVision"
            })
        );
    }
}
