//! Union-subset enforcer
//!
//! Filters a proposed record so that every entity and every tick traces back
//! to at least one raw source. Disagreements between the text and vision
//! sources are settled per tick by [`Governance`] and the anti-smear rule
//! rather than by failing.

use super::policy::{EnforcementPolicy, Governance};
use super::report::{EnforcementReport, TickDropReason};
use crate::normalize::{Confirmation, NameKey, SourceIndex};
use crate::record::{chronological, EntityKind, SoaRecord, Tick};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// The filtered record and what was removed to get there
#[derive(Debug, Clone)]
pub struct Enforcement {
    pub record: SoaRecord,
    pub report: EnforcementReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Drop(TickDropReason),
}

/// Applies the union-subset invariant to a proposal
#[derive(Debug, Clone, Default)]
pub struct UnionSubsetEnforcer {
    policy: EnforcementPolicy,
}

impl UnionSubsetEnforcer {
    pub fn new(policy: EnforcementPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EnforcementPolicy {
        &self.policy
    }

    /// Filter `proposal` against the text and vision sources.
    ///
    /// Pure: the same inputs always yield the same record and report.
    pub fn enforce(
        &self,
        proposal: &SoaRecord,
        text: &SourceIndex,
        vision: &SourceIndex,
    ) -> Enforcement {
        let mut report = EnforcementReport::default();
        for (label, index) in [("text", text), ("vision", vision)] {
            if index.is_structureless() {
                warn!(source = label, "source has no timeline content; it constrains nothing");
                report.structureless_sources.push(label.to_string());
            }
        }

        let mut record = self.filter_entities(proposal, text, vision, &mut report);

        // Window over surviving timepoints only; invented columns never count
        let early: HashSet<String> = chronological(&record.planned_timepoints)
            .into_iter()
            .take(self.policy.early_timepoints)
            .map(|tp| tp.id.clone())
            .collect();

        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for tick in proposal.ticks() {
            if !seen.insert(tick) {
                continue;
            }
            let name = activity_name(proposal, text, vision, &tick.activity_id);
            match self.judge(tick, name.as_ref(), &early, text, vision) {
                Verdict::Keep => kept.push(tick.clone()),
                Verdict::Drop(reason) => {
                    debug!(%tick, %reason, "tick dropped");
                    report.drop_tick(tick.clone(), reason);
                }
            }
        }

        sweep(&mut record, kept, &mut report);
        report.ticks_kept = record.ticks().len();

        info!(
            kept = report.ticks_kept,
            dropped = report.total_ticks_dropped(),
            anti_smear = report.ticks_dropped_for(TickDropReason::AntiSmear),
            "union-subset enforced"
        );
        Enforcement { record, report }
    }

    /// Keep only entities whose id one of the sources declares
    fn filter_entities(
        &self,
        proposal: &SoaRecord,
        text: &SourceIndex,
        vision: &SourceIndex,
        report: &mut EnforcementReport,
    ) -> SoaRecord {
        let mut known = |kind: EntityKind, id: &str| {
            let present = text.contains(kind, id) || vision.contains(kind, id);
            if !present {
                debug!(%kind, id, "entity outside source union dropped");
                report.drop_entity(kind);
            }
            present
        };

        let mut record = SoaRecord::new();
        record.encounters = proposal
            .encounters
            .iter()
            .filter(|e| known(EntityKind::Encounter, &e.id))
            .cloned()
            .collect();
        record.planned_timepoints = proposal
            .planned_timepoints
            .iter()
            .filter(|t| known(EntityKind::Timepoint, &t.id))
            .cloned()
            .collect();
        record.activity_groups = proposal
            .activity_groups
            .iter()
            .filter(|g| known(EntityKind::ActivityGroup, &g.id))
            .cloned()
            .collect();
        record.activities = proposal
            .activities
            .iter()
            .filter(|a| known(EntityKind::Activity, &a.id))
            .cloned()
            .collect();
        record
    }

    fn judge(
        &self,
        tick: &Tick,
        name: Option<&NameKey>,
        early: &HashSet<String>,
        text: &SourceIndex,
        vision: &SourceIndex,
    ) -> Verdict {
        let by_text = text.confirms(tick, name).is_some();
        let by_vision = vision.confirms(tick, name).is_some();
        let smeared = || {
            early.contains(tick.timepoint_id.as_str())
                && vision.ticked_activity(&tick.activity_id, name)
                && vision.ticks_at(&tick.timepoint_id) > 0
        };

        match Governance::of(&tick.timepoint_id, text, vision) {
            Governance::Vision => {
                if by_vision {
                    Verdict::Keep
                } else if by_text && vision.ticks_at(&tick.timepoint_id) == 0 {
                    // Vision missed the whole column
                    Verdict::Keep
                } else if by_text && smeared() {
                    Verdict::Drop(TickDropReason::AntiSmear)
                } else if by_text {
                    Verdict::Drop(TickDropReason::SupersededByVision)
                } else {
                    Verdict::Drop(TickDropReason::OutsideUnion)
                }
            }
            Governance::Text => {
                if by_text && smeared() {
                    Verdict::Drop(TickDropReason::AntiSmear)
                } else if by_text || by_vision {
                    Verdict::Keep
                } else {
                    Verdict::Drop(TickDropReason::OutsideUnion)
                }
            }
            Governance::Ungoverned => {
                let exact = |source: &SourceIndex| {
                    source.confirms(tick, name) == Some(Confirmation::ById)
                };
                if exact(text) || exact(vision) {
                    Verdict::Keep
                } else {
                    Verdict::Drop(TickDropReason::OutsideUnion)
                }
            }
        }
    }
}

/// Normalized name of a candidate's activity: proposal, then text, then vision
fn activity_name(
    proposal: &SoaRecord,
    text: &SourceIndex,
    vision: &SourceIndex,
    activity_id: &str,
) -> Option<NameKey> {
    proposal
        .activity(activity_id)
        .and_then(|a| NameKey::new(&a.name))
        .or_else(|| text.activity_name(activity_id).cloned())
        .or_else(|| vision.activity_name(activity_id).cloned())
}

/// Second pass: drop ticks whose endpoints did not survive, clear encounter
/// links and group members pointing at removed entities.
fn sweep(record: &mut SoaRecord, kept: Vec<Tick>, report: &mut EnforcementReport) {
    let activities: HashSet<String> = record.activities.iter().map(|a| a.id.clone()).collect();
    let timepoints: HashSet<String> = record
        .planned_timepoints
        .iter()
        .map(|t| t.id.clone())
        .collect();
    let encounters: HashSet<String> = record.encounters.iter().map(|e| e.id.clone()).collect();

    for tick in kept {
        if activities.contains(&tick.activity_id) && timepoints.contains(&tick.timepoint_id) {
            record.add_tick(tick);
        } else {
            debug!(%tick, "tick endpoint removed; dropped");
            report.drop_tick(tick, TickDropReason::DanglingReference);
        }
    }

    for tp in &mut record.planned_timepoints {
        if tp
            .encounter_id
            .as_ref()
            .is_some_and(|enc| !encounters.contains(enc))
        {
            tp.encounter_id = None;
            report.references_cleared += 1;
        }
    }
    for group in &mut record.activity_groups {
        let before = group.activity_ids.len();
        group.activity_ids.retain(|m| activities.contains(m));
        report.references_cleared += before - group.activity_ids.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Activity, ActivityGroup, Encounter, Timepoint};

    fn timepoints(record: SoaRecord, n: usize) -> SoaRecord {
        (1..=n).fold(record, |r, i| {
            r.with_timepoint(Timepoint::new(format!("tp{}", i), format!("Visit {}", i)))
        })
    }

    fn run(proposal: &SoaRecord, text: &SoaRecord, vision: &SoaRecord) -> Enforcement {
        UnionSubsetEnforcer::default().enforce(
            proposal,
            &SourceIndex::build(text),
            &SourceIndex::build(vision),
        )
    }

    // === Scenario: vision missed the column ===
    #[test]
    fn text_tick_kept_when_vision_column_is_empty() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "ECG")), 2)
            .with_tick("a1", "tp1");
        let vision = timepoints(SoaRecord::new().with_activity(Activity::new("v1", "Labs")), 2)
            .with_tick("v1", "tp2");
        let proposal = text.clone();

        let out = run(&proposal, &text, &vision);
        assert_eq!(out.record.ticks(), &[Tick::new("a1", "tp1")]);
        assert_eq!(out.report.total_ticks_dropped(), 0);
    }

    // === Scenario: anti-smear on an early column ===
    #[test]
    fn early_text_only_tick_dropped_as_smear() {
        let text = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("a1", "Lab Panel"))
                .with_activity(Activity::new("a2", "ECG")),
            4,
        )
        .with_tick("a1", "tp1")
        .with_tick("a2", "tp1");
        let vision = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("v1", "lab panel"))
                .with_activity(Activity::new("v2", "ecg")),
            4,
        )
        .with_tick("v1", "tp3")
        .with_tick("v1", "tp4")
        .with_tick("v2", "tp1");

        let out = run(&text, &text, &vision);
        assert_eq!(out.record.ticks(), &[Tick::new("a2", "tp1")]);
        assert_eq!(out.report.ticks_dropped_for(TickDropReason::AntiSmear), 1);
        assert_eq!(out.report.dropped[0].tick, Tick::new("a1", "tp1"));
    }

    #[test]
    fn late_text_only_tick_superseded_by_vision() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "Lab Panel")), 5)
            .with_tick("a1", "tp5");
        let vision = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("v1", "Lab Panel"))
                .with_activity(Activity::new("v2", "ECG")),
            5,
        )
        .with_tick("v1", "tp2")
        .with_tick("v2", "tp5");

        let out = run(&text, &text, &vision);
        assert!(out.record.ticks().is_empty());
        assert_eq!(
            out.report.ticks_dropped_for(TickDropReason::SupersededByVision),
            1
        );
    }

    #[test]
    fn zero_window_disables_anti_smear() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "Lab Panel")), 2)
            .with_tick("a1", "tp1");
        let vision = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("v1", "Lab Panel"))
                .with_activity(Activity::new("v2", "ECG")),
            2,
        )
        .with_tick("v1", "tp2")
        .with_tick("v2", "tp1");

        let out = UnionSubsetEnforcer::new(EnforcementPolicy::new().with_early_timepoints(0))
            .enforce(&text, &SourceIndex::build(&text), &SourceIndex::build(&vision));
        assert_eq!(
            out.report.ticks_dropped_for(TickDropReason::SupersededByVision),
            1
        );
        assert_eq!(out.report.ticks_dropped_for(TickDropReason::AntiSmear), 0);
    }

    // === Scenario: both passes number rows act1..actN in different orders ===
    #[test]
    fn shared_activity_id_under_another_name_does_not_confirm() {
        let text = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("act1", "ECG"))
                .with_activity(Activity::new("act2", "Lab Panel")),
            4,
        )
        .with_tick("act2", "tp4");
        let vision = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("act1", "Lab Panel"))
                .with_activity(Activity::new("act2", "ECG")),
            4,
        )
        .with_tick("act2", "tp1")
        .with_tick("act1", "tp2")
        .with_tick("act2", "tp4");

        let out = run(&text, &text, &vision);
        assert!(out.record.ticks().is_empty());
        assert_eq!(
            out.report.ticks_dropped_for(TickDropReason::SupersededByVision),
            1
        );
        assert_eq!(out.report.dropped[0].tick, Tick::new("act2", "tp4"));
    }

    #[test]
    fn invented_early_timepoint_does_not_shift_smear_window() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "Lab Panel")), 3)
            .with_tick("a1", "tp1");
        let vision = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("v1", "Lab Panel"))
                .with_activity(Activity::new("v2", "ECG")),
            3,
        )
        .with_tick("v1", "tp3")
        .with_tick("v2", "tp1");
        let proposal = text.clone().with_timepoint(Timepoint::new("tp0", "Run-in"));

        let out = UnionSubsetEnforcer::new(EnforcementPolicy::new().with_early_timepoints(1))
            .enforce(&proposal, &SourceIndex::build(&text), &SourceIndex::build(&vision));
        assert_eq!(out.report.entities_dropped_for(EntityKind::Timepoint), 1);
        assert_eq!(out.report.ticks_dropped_for(TickDropReason::AntiSmear), 1);
        assert_eq!(
            out.report.ticks_dropped_for(TickDropReason::SupersededByVision),
            0
        );
    }

    #[test]
    fn text_governed_column_keeps_text_ticks() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "ECG")), 3)
            .with_tick("a1", "tp3");
        let vision = timepoints(SoaRecord::new().with_activity(Activity::new("v1", "ECG")), 2)
            .with_tick("v1", "tp1");

        let out = run(&text, &text, &vision);
        assert_eq!(out.record.ticks(), &[Tick::new("a1", "tp3")]);
    }

    // === Scenario: pair present in neither source ===
    #[test]
    fn invented_tick_dropped_unconditionally() {
        let text = timepoints(
            SoaRecord::new()
                .with_activity(Activity::new("X", "X-Ray"))
                .with_activity(Activity::new("a2", "ECG")),
            2,
        )
        .with_tick("a2", "tp2");
        let vision = timepoints(SoaRecord::new(), 2);
        let proposal = text.clone().with_tick("X", "tp1").with_tick("X", "tp9");

        let out = run(&proposal, &text, &vision);
        assert_eq!(out.record.ticks(), &[Tick::new("a2", "tp2")]);
        assert_eq!(out.report.ticks_dropped_for(TickDropReason::OutsideUnion), 2);
    }

    #[test]
    fn entities_outside_union_and_their_references_are_removed() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "ECG")), 1)
            .with_encounter(Encounter::new("e1", "Visit 1"))
            .with_tick("a1", "tp1");
        let vision = SoaRecord::new();
        let proposal = SoaRecord::new()
            .with_activity(Activity::new("a1", "ECG"))
            .with_activity(Activity::new("ghost", "ECG"))
            .with_timepoint(Timepoint::new("tp1", "Visit 1").with_encounter("e-ghost"))
            .with_group(ActivityGroup::new("g1", "Cardio").with_member("a1").with_member("ghost"))
            .with_tick("a1", "tp1")
            .with_tick("ghost", "tp1");

        let out = run(&proposal, &text, &vision);
        assert_eq!(out.report.entities_dropped_for(EntityKind::Activity), 1);
        assert_eq!(out.report.entities_dropped_for(EntityKind::ActivityGroup), 1);
        assert_eq!(out.report.ticks_dropped_for(TickDropReason::DanglingReference), 1);
        assert_eq!(out.report.references_cleared, 1);
        assert_eq!(out.report.structureless_sources, vec!["vision".to_string()]);
        assert_eq!(out.record.ticks(), &[Tick::new("a1", "tp1")]);
        assert!(out.record.dangling_references().is_empty());
    }

    #[test]
    fn enforcement_is_deterministic() {
        let text = timepoints(SoaRecord::new().with_activity(Activity::new("a1", "ECG")), 3)
            .with_tick("a1", "tp1")
            .with_tick("a1", "tp2");
        let vision = timepoints(SoaRecord::new().with_activity(Activity::new("v1", "ECG")), 3)
            .with_tick("v1", "tp3");
        let first = run(&text, &text, &vision);
        let second = run(&text, &text, &vision);
        assert_eq!(first.record, second.record);
        assert_eq!(first.report, second.report);
    }
}
