//! Attributing a reconciled record back to its sources
//!
//! Two entry points: dual-source runs align the record against the text and
//! vision indexes; fragment runs propagate each fragment's tag through the
//! resolver's id mapping.

use super::types::{ProvenanceMap, ProvenanceRecord, SourceTag};
use crate::normalize::{NameKey, SourceIndex};
use crate::record::{EntityKind, SoaRecord, Tick};
use crate::resolve::Resolution;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Entity and cell provenance of a record reconciled from two sources.
pub fn attribute_sources(
    record: &SoaRecord,
    text: &SourceIndex,
    vision: &SourceIndex,
) -> ProvenanceRecord {
    let mut prov = ProvenanceRecord::new();
    for kind in EntityKind::ALL {
        let from_text = contributed_ids(record, kind, text);
        let from_vision = contributed_ids(record, kind, vision);
        prov.merge_tagged(kind, from_text, SourceTag::TextOnly);
        prov.merge_tagged(kind, from_vision, SourceTag::VisionOnly);
    }
    prov.cells = cell_provenance(record, text, vision).cells;
    prov
}

/// Ids of `kind` in the record that the source also contains, by id or,
/// for activities and timepoints, by normalized name.
fn contributed_ids(record: &SoaRecord, kind: EntityKind, source: &SourceIndex) -> Vec<String> {
    let named_in_source = |name: &str| {
        NameKey::new(name).is_some_and(|key| match kind {
            EntityKind::Activity => !source.activities_named(&key).is_empty(),
            EntityKind::Timepoint => !source.timepoints_named(&key).is_empty(),
            _ => false,
        })
    };
    let names: Vec<(&str, &str)> = match kind {
        EntityKind::Activity => record
            .activities
            .iter()
            .map(|a| (a.id.as_str(), a.name.as_str()))
            .collect(),
        EntityKind::Timepoint => record
            .planned_timepoints
            .iter()
            .map(|t| (t.id.as_str(), t.name.as_str()))
            .collect(),
        _ => record.ids(kind).into_iter().map(|id| (id, "")).collect(),
    };
    // A shared activity id only counts when the source's row has a compatible name
    let same_entity = |id: &str, name: &str| {
        source.contains(kind, id)
            && (kind != EntityKind::Activity
                || source.same_activity(id, NameKey::new(name).as_ref()))
    };
    names
        .into_iter()
        .filter(|(id, name)| same_entity(id, name) || named_in_source(name))
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Per-tick provenance, aligning activities and timepoints by name.
///
/// Ids differ between passes, so a tick's endpoints are mapped to every
/// same-named entity of each source (plus the literal id when the source
/// has it under a compatible name) and the source's tick set is checked
/// with each pair. Empty when either source has no timeline content.
pub fn cell_provenance(
    record: &SoaRecord,
    text: &SourceIndex,
    vision: &SourceIndex,
) -> ProvenanceRecord {
    let mut prov = ProvenanceRecord::new();
    if text.is_structureless() || vision.is_structureless() {
        warn!("a source has no timeline content; cell provenance left empty");
        return prov;
    }

    for tick in record.ticks() {
        let activity_name = record
            .activity(&tick.activity_id)
            .and_then(|a| NameKey::new(&a.name));
        let timepoint_name = record
            .timepoint(&tick.timepoint_id)
            .and_then(|t| NameKey::new(&t.name));

        let (a_name, t_name) = (activity_name.as_ref(), timepoint_name.as_ref());
        let in_text = aligned_tick_exists(tick, a_name, t_name, text);
        let in_vision = aligned_tick_exists(tick, a_name, t_name, vision);

        let tag = match (in_text, in_vision) {
            (true, true) => SourceTag::Both,
            (true, false) => SourceTag::TextOnly,
            (false, true) => SourceTag::VisionOnly,
            (false, false) => {
                debug!(%tick, "tick not aligned with either source");
                continue;
            }
        };
        prov.record_cell(&tick.activity_id, &tick.timepoint_id, tag);
    }
    prov
}

fn aligned_tick_exists(
    tick: &Tick,
    activity_name: Option<&NameKey>,
    timepoint_name: Option<&NameKey>,
    source: &SourceIndex,
) -> bool {
    let mut activities: Vec<&str> = activity_name
        .map(|n| source.activities_named(n).iter().map(String::as_str).collect())
        .unwrap_or_default();
    if (source.contains(EntityKind::Activity, &tick.activity_id) || activities.is_empty())
        && source.same_activity(&tick.activity_id, activity_name)
    {
        activities.push(&tick.activity_id);
    }
    let mut timepoints: Vec<&str> = timepoint_name
        .map(|n| source.timepoints_named(n).iter().map(String::as_str).collect())
        .unwrap_or_default();
    if source.has_timepoint(&tick.timepoint_id) || timepoints.is_empty() {
        timepoints.push(&tick.timepoint_id);
    }

    activities.iter().any(|a| {
        timepoints
            .iter()
            .any(|t| source.has_tick(&Tick::new(*a, *t)))
    })
}

/// Provenance of a fragment merge.
///
/// `tags[i]` is the source tag of raw fragment `i`; fragments without a tag
/// count as text. Only entities and ticks present in `record` are listed.
pub fn attribute_fragments(
    record: &SoaRecord,
    resolution: &Resolution,
    tags: &[SourceTag],
) -> ProvenanceRecord {
    let tag_of = |fragment: usize| tags.get(fragment).copied().unwrap_or(SourceTag::TextOnly);

    let mut prov = ProvenanceRecord::new();
    for kind in EntityKind::ALL {
        let present: HashSet<&str> = record.ids(kind).into_iter().collect();
        let mut map = ProvenanceMap::new();
        for entry in resolution.mapping.entries() {
            if entry.local.kind == kind && present.contains(entry.global_id) {
                map.record(entry.global_id, tag_of(entry.local.fragment));
            }
        }
        prov.entities.insert(kind, map);
    }

    for tick in record.ticks() {
        if let Some(fragments) = resolution.tick_fragments.get(tick) {
            for &fragment in fragments {
                prov.record_cell(&tick.activity_id, &tick.timepoint_id, tag_of(fragment));
            }
        }
    }
    prov
}
