//! Default merge proposal built straight from the two sources
//!
//! Used when no external proposal is supplied, or when the supplied one is
//! unreadable. The result is still run through the enforcer.

use crate::normalize::NameKey;
use crate::record::{EntityKind, SoaRecord, Tick};
use std::collections::HashMap;
use tracing::debug;

/// How a vision entity maps into the proposal
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    /// Same entity as a text one; carries the text id
    Existing(String),
    /// New to the proposal under its own id
    Added(String),
    /// Left out, together with everything referencing it
    Excluded,
}

impl Placement {
    fn id(&self) -> Option<&str> {
        match self {
            Self::Existing(id) | Self::Added(id) => Some(id),
            Self::Excluded => None,
        }
    }
}

/// Place one vision entity against the text entities of the same kind.
///
/// Activities match by name first, because activity ids never line up
/// between passes, and an id collision under a different name is a
/// different activity that cannot be keyed safely. The other kinds share
/// ids across passes, so the id wins and the name is the fallback.
fn place(
    kind: EntityKind,
    id: &str,
    name: &str,
    text_ids: &HashMap<&str, Option<NameKey>>,
    text_names: &HashMap<NameKey, &str>,
) -> Placement {
    let key = NameKey::new(name);
    let by_name = key.as_ref().and_then(|k| text_names.get(k)).copied();
    match kind {
        EntityKind::Activity => match (by_name, text_ids.get(id)) {
            (Some(text_id), _) => Placement::Existing(text_id.to_string()),
            (None, Some(_)) => Placement::Excluded,
            (None, None) => Placement::Added(id.to_string()),
        },
        _ => match (text_ids.contains_key(id), by_name) {
            (true, _) => Placement::Existing(id.to_string()),
            (false, Some(text_id)) => Placement::Existing(text_id.to_string()),
            (false, None) => Placement::Added(id.to_string()),
        },
    }
}

fn name_tables<'a>(
    entries: impl Iterator<Item = (&'a str, &'a str)>,
) -> (HashMap<&'a str, Option<NameKey>>, HashMap<NameKey, &'a str>) {
    let mut ids = HashMap::new();
    let mut names = HashMap::new();
    for (id, name) in entries {
        let key = NameKey::new(name);
        if let Some(ref k) = key {
            names.entry(k.clone()).or_insert(id);
        }
        ids.insert(id, key);
    }
    (ids, names)
}

/// The union of both sources, text first.
///
/// Every text entity and tick is kept verbatim. Vision entities are added
/// when the text pass has no counterpart; vision references are re-keyed
/// onto text ids where a counterpart exists.
pub fn union_proposal(text: &SoaRecord, vision: &SoaRecord) -> SoaRecord {
    let mut out = text.clone();
    out.schedule_timeline = None;

    let mut rekey: HashMap<(EntityKind, String), Placement> = HashMap::new();

    let (ids, names) = name_tables(text.encounters.iter().map(|e| (e.id.as_str(), e.name.as_str())));
    for enc in &vision.encounters {
        let placement = place(EntityKind::Encounter, &enc.id, &enc.name, &ids, &names);
        match &placement {
            Placement::Added(_) => out.encounters.push(enc.clone()),
            Placement::Existing(id) => {
                if let Some(existing) = out.encounters.iter_mut().find(|e| &e.id == id) {
                    if existing.timing.is_none() {
                        existing.timing = enc.timing.clone();
                    }
                }
            }
            Placement::Excluded => {}
        }
        rekey.insert((EntityKind::Encounter, enc.id.clone()), placement);
    }

    let (ids, names) = name_tables(
        text.planned_timepoints
            .iter()
            .map(|t| (t.id.as_str(), t.name.as_str())),
    );
    for tp in &vision.planned_timepoints {
        let placement = place(EntityKind::Timepoint, &tp.id, &tp.name, &ids, &names);
        if let Placement::Added(_) = placement {
            let mut added = tp.clone();
            added.encounter_id = None;
            out.planned_timepoints.push(added);
        }
        rekey.insert((EntityKind::Timepoint, tp.id.clone()), placement);
    }

    let (ids, names) = name_tables(text.activities.iter().map(|a| (a.id.as_str(), a.name.as_str())));
    for activity in &vision.activities {
        let placement = place(EntityKind::Activity, &activity.id, &activity.name, &ids, &names);
        match placement {
            Placement::Added(_) => out.activities.push(activity.clone()),
            Placement::Excluded => {
                debug!(activity = %activity.id, "vision activity collides with a differently named text activity; left out")
            }
            Placement::Existing(_) => {}
        }
        rekey.insert((EntityKind::Activity, activity.id.clone()), placement);
    }

    let (ids, names) = name_tables(
        text.activity_groups
            .iter()
            .map(|g| (g.id.as_str(), g.name.as_str())),
    );
    for group in &vision.activity_groups {
        let placement = place(EntityKind::ActivityGroup, &group.id, &group.name, &ids, &names);
        if let Placement::Added(_) = placement {
            let mut added = group.clone();
            added.activity_ids.clear();
            out.activity_groups.push(added);
        }
        rekey.insert((EntityKind::ActivityGroup, group.id.clone()), placement);
    }

    let resolve = |kind: EntityKind, id: &str| -> Option<String> {
        rekey
            .get(&(kind, id.to_string()))
            .and_then(Placement::id)
            .map(str::to_string)
    };

    // References carried over from vision, through the re-key table
    for tp in &vision.planned_timepoints {
        let (Some(tp_id), Some(enc)) = (
            resolve(EntityKind::Timepoint, &tp.id),
            tp.encounter_id.as_deref(),
        ) else {
            continue;
        };
        let Some(enc_id) = resolve(EntityKind::Encounter, enc) else {
            continue;
        };
        if let Some(target) = out.planned_timepoints.iter_mut().find(|t| t.id == tp_id) {
            if target.encounter_id.is_none() {
                target.encounter_id = Some(enc_id);
            }
        }
    }
    for group in &vision.activity_groups {
        let Some(group_id) = resolve(EntityKind::ActivityGroup, &group.id) else {
            continue;
        };
        let members: Vec<String> = group
            .activity_ids
            .iter()
            .filter_map(|m| resolve(EntityKind::Activity, m))
            .collect();
        if let Some(target) = out.activity_groups.iter_mut().find(|g| g.id == group_id) {
            for member in members {
                target.add_member(member);
            }
        }
    }
    for tick in vision.ticks() {
        let activity = resolve(EntityKind::Activity, &tick.activity_id);
        let timepoint = resolve(EntityKind::Timepoint, &tick.timepoint_id)
            .unwrap_or_else(|| tick.timepoint_id.clone());
        if let Some(activity) = activity {
            out.add_tick(Tick::new(activity, timepoint));
        }
    }

    out
}
