//! Id alias keys
//!
//! Extraction passes spell the same id in different ways: `encounter-3`,
//! `enc_3`, `ENC3`, `Encounter 03`. The alias key folds these together.

/// Letter-run spellings mapped to one canonical word.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("encounter", &["enc", "encounter", "encounters", "visit", "vis"]),
    (
        "timepoint",
        &["tp", "pt", "tpt", "timepoint", "timepoints", "plannedtimepoint"],
    ),
    ("activity", &["act", "activity", "activities"]),
    (
        "activitygroup",
        &["grp", "group", "ag", "activitygroup", "actgroup", "actgrp"],
    ),
];

fn canonical_word(word: &str) -> &str {
    SYNONYMS
        .iter()
        .find(|(_, spellings)| spellings.contains(&word))
        .map(|(canonical, _)| *canonical)
        .unwrap_or(word)
}

/// Fold an id into its alias key.
///
/// The id is lower-cased and split into letter runs and digit runs;
/// separators vanish, leading zeros are dropped from numbers, and the
/// first letter run goes through the synonym table.
pub fn alias_key(id: &str) -> String {
    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    for c in id.chars().flat_map(char::to_lowercase) {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != current_is_digit {
            runs.push(std::mem::take(&mut current));
        }
        current_is_digit = is_digit;
        current.push(c);
    }
    if !current.is_empty() {
        runs.push(current);
    }

    // Letter runs split only by separators belong together ("planned_timepoint").
    let mut merged: Vec<String> = Vec::new();
    for run in runs {
        let run_is_digit = run.chars().all(|c| c.is_ascii_digit());
        match merged.last_mut() {
            Some(prev) if !run_is_digit && !prev.chars().all(|c| c.is_ascii_digit()) => {
                prev.push_str(&run)
            }
            _ => merged.push(run),
        }
    }

    merged
        .iter()
        .enumerate()
        .map(|(i, run)| {
            if run.chars().all(|c| c.is_ascii_digit()) {
                let trimmed = run.trim_start_matches('0');
                let number = if trimmed.is_empty() { "0" } else { trimmed };
                number.to_string()
            } else if i == 0 {
                canonical_word(run).to_string()
            } else {
                run.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("|")
}
