//! Shared fixtures and invariant checks for the reconciliation tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use soa_reconcile::{
    parse_record, Activity, EntityKind, NameKey, SoaRecord, SourceIndex, Tick, Timepoint,
};

/// A wrapped fragment with the three core collections
pub fn fragment(activities: Value, timepoints: Value, ticks: Value) -> Value {
    json!({
        "schemaVersion": "1.0",
        "timeline": {
            "activities": activities,
            "plannedTimepoints": timepoints,
            "activityTimepoints": ticks
        }
    })
}

/// Parse a raw fixture, panicking on malformed input
pub fn record(raw: &Value) -> SoaRecord {
    parse_record(raw).expect("fixture should parse").record
}

/// `n` timepoints `tp1..tpn` named `Visit 1..Visit n`
pub fn visits(mut record: SoaRecord, n: usize) -> SoaRecord {
    for i in 1..=n {
        record = record.with_timepoint(Timepoint::new(format!("tp{}", i), format!("Visit {}", i)));
    }
    record
}

/// A random text/vision pair over the same document.
///
/// Both passes share timepoint ids; activity ids are pass-specific (`t-*`
/// and `v-*`) while names line up, as real extraction passes do.
pub fn random_sources(rng: &mut StdRng) -> (SoaRecord, SoaRecord) {
    let activities = rng.gen_range(2..7);
    let timepoints = rng.gen_range(2..8);

    let mut text = SoaRecord::new();
    let mut vision = SoaRecord::new();
    for a in 1..=activities {
        let name = format!("Procedure {}", a);
        if rng.gen_bool(0.9) {
            text = text.with_activity(Activity::new(format!("t-{}", a), name.clone()));
        }
        if rng.gen_bool(0.8) {
            vision = vision.with_activity(Activity::new(format!("v-{}", a), name));
        }
    }
    for t in 1..=timepoints {
        let tp = Timepoint::new(format!("tp{}", t), format!("Visit {}", t));
        if rng.gen_bool(0.9) {
            text = text.with_timepoint(tp.clone());
        }
        if rng.gen_bool(0.7) {
            vision = vision.with_timepoint(tp);
        }
    }

    for source in [&mut text, &mut vision] {
        let activity_ids: Vec<String> = source.activities.iter().map(|a| a.id.clone()).collect();
        let timepoint_ids: Vec<String> = source
            .planned_timepoints
            .iter()
            .map(|t| t.id.clone())
            .collect();
        for a in &activity_ids {
            for t in &timepoint_ids {
                if rng.gen_bool(0.35) {
                    source.add_tick(Tick::new(a.clone(), t.clone()));
                }
            }
        }
    }
    (text, vision)
}

/// A random text/vision pair whose passes both number their rows
/// `act1..actN`, each in its own row order.
///
/// Ticks come from one shared matrix keyed by procedure name; each pass
/// misses some and adds a few of its own.
pub fn random_shared_id_sources(rng: &mut StdRng) -> (SoaRecord, SoaRecord) {
    let activities = rng.gen_range(2..7);
    let timepoints = rng.gen_range(2..8);
    let names: Vec<String> = (1..=activities).map(|a| format!("Procedure {}", a)).collect();
    let truth: Vec<(usize, usize)> = (0..activities)
        .flat_map(|a| (1..=timepoints).map(move |t| (a, t)))
        .filter(|_| rng.gen_bool(0.35))
        .collect();
    let mut shuffled: Vec<usize> = (0..activities).collect();
    shuffled.shuffle(rng);

    let mut pass = |row_order: Vec<usize>, keep_row: f64, keep_tp: f64| {
        let rows: Vec<usize> = row_order
            .into_iter()
            .filter(|_| rng.gen_bool(keep_row))
            .collect();
        let mut record = SoaRecord::new();
        for (i, &row) in rows.iter().enumerate() {
            let id = format!("act{}", i + 1);
            record = record.with_activity(Activity::new(id, names[row].clone()));
        }
        let tps: Vec<usize> = (1..=timepoints).filter(|_| rng.gen_bool(keep_tp)).collect();
        for &t in &tps {
            let tp = Timepoint::new(format!("tp{}", t), format!("Visit {}", t));
            record = record.with_timepoint(tp);
        }
        for (i, &row) in rows.iter().enumerate() {
            for &t in &tps {
                let asserted = truth.contains(&(row, t));
                if (asserted && rng.gen_bool(0.85)) || (!asserted && rng.gen_bool(0.05)) {
                    let tick = Tick::new(format!("act{}", i + 1), format!("tp{}", t));
                    record.add_tick(tick);
                }
            }
        }
        record
    };

    let text = pass((0..activities).collect(), 0.9, 0.9);
    let vision = pass(shuffled, 0.8, 0.7);
    (text, vision)
}

/// Add entities and ticks that neither source contains
pub fn with_inventions(mut proposal: SoaRecord, rng: &mut StdRng) -> SoaRecord {
    proposal = proposal
        .with_activity(Activity::new("invented-1", "Phantom Scan"))
        .with_timepoint(Timepoint::new("tp99", "Visit 99"));
    let activity_ids: Vec<String> = proposal.activities.iter().map(|a| a.id.clone()).collect();
    let timepoint_ids: Vec<String> = proposal
        .planned_timepoints
        .iter()
        .map(|t| t.id.clone())
        .collect();
    for a in &activity_ids {
        for t in &timepoint_ids {
            if rng.gen_bool(0.2) {
                proposal.add_tick(Tick::new(a.clone(), t.clone()));
            }
        }
    }
    proposal
}

/// Every reference in the record resolves inside the record
pub fn assert_referentially_intact(record: &SoaRecord) {
    let problems = record.dangling_references();
    assert!(problems.is_empty(), "dangling references: {:?}", problems);
}

/// Every entity id and tick of `output` appears in at least one source,
/// ticks compared by id or by activity name.
pub fn assert_union_subset(output: &SoaRecord, sources: &[&SoaRecord]) {
    let indexes: Vec<SourceIndex> = sources.iter().map(|s| SourceIndex::build(s)).collect();
    for kind in EntityKind::ALL {
        for id in output.ids(kind) {
            assert!(
                indexes.iter().any(|idx| idx.contains(kind, id)),
                "{} {} is in no source",
                kind,
                id
            );
        }
    }
    for tick in output.ticks() {
        let name = output.activity(&tick.activity_id).and_then(|a| NameKey::new(&a.name));
        assert!(
            indexes
                .iter()
                .any(|idx| idx.confirms(tick, name.as_ref()).is_some()),
            "tick {} is in no source",
            tick
        );
    }
}
