//! Variant input shapes → canonical `SoaRecord`
//!
//! Extraction passes disagree on key names and casing (`plannedTimepoints`
//! vs `timepoints`, `encounterId` vs `encounter_id`), on nesting (bare
//! timeline vs `study.versions[].timeline`), and on how ticks are spelled.
//! Everything is funnelled through this module once, before any merge
//! logic runs; nothing downstream looks at raw JSON.

use crate::record::{Activity, ActivityGroup, Encounter, SoaRecord, Tick, Timepoint};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

const TIMELINE_KEYS: &[&str] = &["timeline", "soa", "scheduleOfActivities"];
const ACTIVITY_KEYS: &[&str] = &["activities"];
const TIMEPOINT_KEYS: &[&str] = &["plannedTimepoints", "timepoints"];
const ENCOUNTER_KEYS: &[&str] = &["encounters", "visits"];
const GROUP_KEYS: &[&str] = &["activityGroups", "groups"];
const TICK_KEYS: &[&str] = &["activityTimepoints", "ticks", "matrix"];
const VERSION_KEYS: &[&str] = &["schemaVersion", "usdmVersion", "version"];

const ID_KEYS: &[&str] = &["id"];
const NAME_KEYS: &[&str] = &["name", "label", "title"];
const DESCRIPTION_KEYS: &[&str] = &["description"];
const ENCOUNTER_REF_KEYS: &[&str] = &["encounterId", "encounter"];
const TIMING_KEYS: &[&str] = &["timing", "window", "timingLabel"];
const MEMBER_KEYS: &[&str] = &["activityIds", "activities"];
const GROUP_REF_KEYS: &[&str] = &["activityGroupId", "groupId"];
const ROW_TIMEPOINT_KEYS: &[&str] = &["timepointIds", "plannedTimepointIds"];
const TICK_ACTIVITY_KEYS: &[&str] = &["activityId", "activity"];
const TICK_TIMEPOINT_KEYS: &[&str] = &["timepointId", "plannedTimepointId", "tpId", "timepoint"];

/// Why an input could not be read as a record at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedFragment {
    #[error("input is not a JSON object")]
    NotAnObject,

    #[error("no activities or timepoints collection found")]
    NoTimeline,
}

/// A record recovered from one raw input
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub record: SoaRecord,
    /// Version string declared by the input container, if any
    pub schema_version: Option<String>,
    /// Entries dropped while reading (no id, duplicate id, unreadable tick)
    pub skipped_entries: usize,
}

/// Read a raw input into the canonical record shape.
pub fn parse_record(raw: &Value) -> Result<Normalized, MalformedFragment> {
    let root = raw.as_object().ok_or(MalformedFragment::NotAnObject)?;
    let timeline = locate_timeline(root);

    let activities = field(timeline, ACTIVITY_KEYS).and_then(Value::as_array);
    let timepoints = field(timeline, TIMEPOINT_KEYS).and_then(Value::as_array);
    if activities.is_none() && timepoints.is_none() {
        return Err(MalformedFragment::NoTimeline);
    }

    let mut out = Normalized {
        schema_version: field(root, VERSION_KEYS).and_then(text),
        ..Default::default()
    };
    let record = &mut out.record;
    let skipped = &mut out.skipped_entries;

    let mut seen = HashSet::new();
    for item in array_at(timeline, ENCOUNTER_KEYS) {
        match item.as_object().and_then(read_encounter) {
            Some(e) if seen.insert(e.id.clone()) => record.encounters.push(e),
            _ => *skipped += 1,
        }
    }

    seen.clear();
    for item in timepoints.into_iter().flatten() {
        match item.as_object().and_then(read_timepoint) {
            Some(t) if seen.insert(t.id.clone()) => record.planned_timepoints.push(t),
            _ => *skipped += 1,
        }
    }

    seen.clear();
    for item in array_at(timeline, GROUP_KEYS) {
        match item.as_object().and_then(read_group) {
            Some(g) if seen.insert(g.id.clone()) => record.activity_groups.push(g),
            _ => *skipped += 1,
        }
    }

    seen.clear();
    let mut row_ticks = Vec::new();
    let mut back_refs = Vec::new();
    for item in activities.into_iter().flatten() {
        let Some(obj) = item.as_object() else {
            *skipped += 1;
            continue;
        };
        match read_activity(obj) {
            Some(a) if seen.insert(a.id.clone()) => {
                if let Some(group_id) = field(obj, GROUP_REF_KEYS).and_then(scalar_id) {
                    back_refs.push((a.id.clone(), group_id));
                }
                for tp in array_at(obj, ROW_TIMEPOINT_KEYS).filter_map(scalar_id) {
                    row_ticks.push(Tick::new(a.id.clone(), tp));
                }
                record.activities.push(a);
            }
            _ => *skipped += 1,
        }
    }

    for (activity_id, group_id) in back_refs {
        match record.activity_groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => group.add_member(activity_id),
            None => debug!(activity = %activity_id, group = %group_id, "group back-reference to undeclared group ignored"),
        }
    }

    for item in array_at(timeline, TICK_KEYS) {
        match read_tick(item) {
            Some(tick) => {
                record.add_tick(tick);
            }
            None => *skipped += 1,
        }
    }
    for tick in row_ticks {
        record.add_tick(tick);
    }

    if out.skipped_entries > 0 {
        debug!(skipped = out.skipped_entries, "entries skipped while normalizing record");
    }
    Ok(out)
}

/// Find the timeline object inside whatever container the input uses.
fn locate_timeline(root: &Map<String, Value>) -> &Map<String, Value> {
    if let Some(study) = field(root, &["study"]).and_then(Value::as_object) {
        let versions = field(study, &["versions"]).and_then(Value::as_array);
        for version in versions.into_iter().flatten() {
            if let Some(tl) = version
                .as_object()
                .and_then(|v| field(v, TIMELINE_KEYS))
                .and_then(Value::as_object)
            {
                return tl;
            }
        }
        if let Some(tl) = field(study, TIMELINE_KEYS).and_then(Value::as_object) {
            return tl;
        }
    }
    field(root, TIMELINE_KEYS)
        .and_then(Value::as_object)
        .unwrap_or(root)
}

fn read_activity(obj: &Map<String, Value>) -> Option<Activity> {
    let id = field(obj, ID_KEYS).and_then(scalar_id)?;
    let name = field(obj, NAME_KEYS).and_then(text).unwrap_or_default();
    Some(Activity { id, name })
}

fn read_timepoint(obj: &Map<String, Value>) -> Option<Timepoint> {
    let id = field(obj, ID_KEYS).and_then(scalar_id)?;
    Some(Timepoint {
        id,
        name: field(obj, NAME_KEYS).and_then(text).unwrap_or_default(),
        description: field(obj, DESCRIPTION_KEYS).and_then(text),
        encounter_id: field(obj, ENCOUNTER_REF_KEYS).and_then(scalar_id),
    })
}

fn read_encounter(obj: &Map<String, Value>) -> Option<Encounter> {
    let id = field(obj, ID_KEYS).and_then(scalar_id)?;
    Some(Encounter {
        id,
        name: field(obj, NAME_KEYS).and_then(text).unwrap_or_default(),
        timing: field(obj, TIMING_KEYS).and_then(text),
    })
}

fn read_group(obj: &Map<String, Value>) -> Option<ActivityGroup> {
    let id = field(obj, ID_KEYS).and_then(scalar_id)?;
    let mut group = ActivityGroup::new(id, field(obj, NAME_KEYS).and_then(text).unwrap_or_default());
    for member in array_at(obj, MEMBER_KEYS).filter_map(scalar_id) {
        group.add_member(member);
    }
    Some(group)
}

fn read_tick(item: &Value) -> Option<Tick> {
    match item {
        Value::Object(obj) => {
            let activity = field(obj, TICK_ACTIVITY_KEYS).and_then(scalar_id)?;
            let timepoint = field(obj, TICK_TIMEPOINT_KEYS).and_then(scalar_id)?;
            Some(Tick::new(activity, timepoint))
        }
        Value::Array(pair) if pair.len() == 2 => {
            Some(Tick::new(scalar_id(&pair[0])?, scalar_id(&pair[1])?))
        }
        _ => None,
    }
}

/// Key comparison form: lower case, separators dropped.
fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up the first non-null value under any of the given key spellings.
///
/// Exact spellings are tried first, then a case- and separator-insensitive
/// pass (`encounter_id` finds `encounterId`).
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    for name in names {
        if let Some(v) = obj.get(*name).filter(|v| !v.is_null()) {
            return Some(v);
        }
    }
    let wanted: Vec<String> = names.iter().map(|n| fold_key(n)).collect();
    obj.iter()
        .find(|(k, v)| !v.is_null() && wanted.contains(&fold_key(k)))
        .map(|(_, v)| v)
}

fn array_at<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> impl Iterator<Item = &'a Value> {
    field(obj, names)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// An id: trimmed non-empty string, a number, or an object carrying an id.
fn scalar_id(v: &Value) -> Option<String> {
    match v {
        Value::Object(obj) => field(obj, ID_KEYS).and_then(scalar_id),
        other => text(other),
    }
}

fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
