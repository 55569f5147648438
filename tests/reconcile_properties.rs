//! Property checks over seeded random inputs
//!
//! Seeds are fixed so failures reproduce.

mod common;

use common::{
    assert_referentially_intact, assert_union_subset, fragment, random_shared_id_sources,
    random_sources, with_inventions,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use soa_reconcile::enforce::union_proposal;
use soa_reconcile::{
    EnforcementPolicy, EntityKind, IdentityResolver, NameKey, ProvenanceRecord, SourceIndex,
    SourceTag, UnionSubsetEnforcer,
};

const SEEDS: std::ops::Range<u64> = 0..64;

// === Union-subset and referential integrity ===

#[test]
fn enforced_output_stays_inside_source_union() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (text, vision) = random_sources(&mut rng);
        let proposal = with_inventions(union_proposal(&text, &vision), &mut rng);
        let window = rng.gen_range(0..4);

        let out = UnionSubsetEnforcer::new(EnforcementPolicy::new().with_early_timepoints(window))
            .enforce(
                &proposal,
                &SourceIndex::build(&text),
                &SourceIndex::build(&vision),
            );

        assert_union_subset(&out.record, &[&text, &vision]);
        assert_referentially_intact(&out.record);
        assert!(out.record.activity("invented-1").is_none(), "seed {}", seed);
        assert_eq!(
            out.report.ticks_kept + out.report.total_ticks_dropped(),
            proposal.ticks().len(),
            "seed {}",
            seed
        );
    }
}

#[test]
fn shared_row_numbering_never_confirms_across_names() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (text, vision) = random_shared_id_sources(&mut rng);
        let proposal = with_inventions(union_proposal(&text, &vision), &mut rng);
        let vision_idx = SourceIndex::build(&vision);

        let out = UnionSubsetEnforcer::default().enforce(
            &proposal,
            &SourceIndex::build(&text),
            &vision_idx,
        );
        assert_union_subset(&out.record, &[&text, &vision]);
        assert_referentially_intact(&out.record);

        // Where vision declared the column, a kept tick is one vision
        // asserted for that same-named row, or vision left the column empty
        for tick in out.record.ticks() {
            if !vision_idx.has_timepoint(&tick.timepoint_id) {
                continue;
            }
            let name = out
                .record
                .activity(&tick.activity_id)
                .and_then(|a| NameKey::new(&a.name));
            assert!(
                vision_idx.confirms(tick, name.as_ref()).is_some()
                    || vision_idx.ticks_at(&tick.timepoint_id) == 0,
                "seed {}: {} kept against vision",
                seed,
                tick
            );
        }
    }
}

#[test]
fn every_source_tick_survives_when_sources_agree() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let (text, _) = random_sources(&mut rng);

        let index = SourceIndex::build(&text);
        let out = UnionSubsetEnforcer::default().enforce(&text, &index, &index);
        assert_eq!(out.record.ticks(), text.ticks(), "seed {}", seed);
    }
}

#[test]
fn merged_fragments_are_referentially_intact() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let fragments: Vec<Value> = (0..rng.gen_range(1..6))
            .map(|_| {
                let (text, _) = random_sources(&mut rng);
                serde_json::to_value(&text).unwrap()
            })
            .collect();
        let res = IdentityResolver::new().resolve_raw(&fragments);
        assert_referentially_intact(&res.record);
    }
}

// === Determinism ===

#[test]
fn repeated_merges_assign_identical_ids() {
    let mut rng = StdRng::seed_from_u64(11);
    let fragments: Vec<Value> = (0..5)
        .map(|_| serde_json::to_value(random_sources(&mut rng).0).unwrap())
        .collect();

    let first = IdentityResolver::new().resolve_raw(&fragments);
    let second = IdentityResolver::new().resolve_raw(&fragments);

    assert_eq!(
        serde_json::to_string(&first.mapping).unwrap(),
        serde_json::to_string(&second.mapping).unwrap()
    );
    assert_eq!(first.record, second.record);
    assert_eq!(first.report, second.report);
}

#[test]
fn repeated_enforcement_drops_identically() {
    let mut rng = StdRng::seed_from_u64(23);
    let (text, vision) = random_sources(&mut rng);
    let proposal = with_inventions(union_proposal(&text, &vision), &mut rng);
    let (ti, vi) = (SourceIndex::build(&text), SourceIndex::build(&vision));

    let a = UnionSubsetEnforcer::default().enforce(&proposal, &ti, &vi);
    let b = UnionSubsetEnforcer::default().enforce(&proposal, &ti, &vi);
    assert_eq!(a.record, b.record);
    assert_eq!(a.report, b.report);
}

// === Alias collapse ===

#[test]
fn alias_fragment_does_not_add_entities() {
    let first = json!({
        "encounters": [{ "id": "encounter-3", "name": "Visit 3" }],
        "plannedTimepoints": [{ "id": "timepoint-1", "name": "Week 6", "encounterId": "encounter-3" }]
    });
    let alias = json!({
        "encounters": [{ "id": "enc_3" }],
        "plannedTimepoints": [{ "id": "TP1", "encounterId": "ENC3" }]
    });

    let once = IdentityResolver::new().resolve_raw(&[first.clone()]);
    let twice = IdentityResolver::new().resolve_raw(&[first, alias]);

    for kind in EntityKind::ALL {
        assert_eq!(
            once.record.entity_count(kind),
            twice.record.entity_count(kind),
            "{}",
            kind
        );
    }
    assert_eq!(twice.report.matched_by_alias, 2);
    assert_eq!(
        twice.record.planned_timepoints[0].encounter_id.as_deref(),
        Some("encounter-1")
    );
}

#[test]
fn remerging_a_fragment_is_idempotent() {
    let f = fragment(
        json!([{ "id": "a1", "name": "ECG" }, { "id": "a2", "name": "Labs" }]),
        json!([{ "id": "t1", "name": "Day 1" }]),
        json!([["a1", "t1"], ["a2", "t1"]]),
    );
    let once = IdentityResolver::new().resolve_raw(&[f.clone()]);
    let thrice = IdentityResolver::new().resolve_raw(&[f.clone(), f.clone(), f]);
    assert_eq!(once.record, thrice.record);
}

// === Provenance merge commutativity ===

fn random_provenance(rng: &mut StdRng, tag: SourceTag) -> ProvenanceRecord {
    let mut prov = ProvenanceRecord::new();
    let ids: Vec<String> = (1..=6)
        .filter(|_| rng.gen_bool(0.5))
        .map(|i| format!("activity-{}", i))
        .collect();
    prov.merge_tagged(EntityKind::Activity, ids.clone(), tag);
    for id in &ids {
        for t in 1..=4 {
            if rng.gen_bool(0.4) {
                prov.record_cell(id, &format!("timepoint-{}", t), tag);
            }
        }
    }
    prov
}

#[test]
fn provenance_merge_order_does_not_matter() {
    let tags = [
        SourceTag::TextOnly,
        SourceTag::VisionOnly,
        SourceTag::TextOnly,
        SourceTag::Both,
        SourceTag::VisionOnly,
    ];
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let parts: Vec<ProvenanceRecord> = tags
            .iter()
            .map(|tag| random_provenance(&mut rng, *tag))
            .collect();

        let mut reference = ProvenanceRecord::new();
        for part in &parts {
            reference.merge(part);
        }

        for _ in 0..8 {
            let mut order: Vec<&ProvenanceRecord> = parts.iter().collect();
            order.shuffle(&mut rng);
            let mut merged = ProvenanceRecord::new();
            for part in order {
                merged.merge(part);
            }
            assert_eq!(merged, reference, "seed {}", seed);
        }
    }
}

#[test]
fn text_then_vision_equals_vision_then_text() {
    let mut rng = StdRng::seed_from_u64(5);
    let text = random_provenance(&mut rng, SourceTag::TextOnly);
    let vision = random_provenance(&mut rng, SourceTag::VisionOnly);

    let mut xy = text.clone();
    xy.merge(&vision);
    let mut yx = vision.clone();
    yx.merge(&text);
    assert_eq!(xy, yx);
}
