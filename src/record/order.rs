//! Stable ordering helpers for ids
//!
//! Ids produced by extraction passes and by the resolver carry a trailing
//! sequence number (`tp3`, `timepoint-12`). Plain string order puts
//! `timepoint-10` before `timepoint-2`, so ordering goes through
//! [`natural_cmp`].

use super::entity::Timepoint;
use std::cmp::Ordering;

/// Split an id into its non-numeric prefix and trailing number, if any.
fn split_trailing_number(id: &str) -> Option<(&str, u64)> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let number = id[digits_start..].parse().ok()?;
    Some((&id[..digits_start], number))
}

/// Numeric-aware comparison: `a-2 < a-10`, falling back to string order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (split_trailing_number(a), split_trailing_number(b)) {
        (Some((pa, na)), Some((pb, nb))) => pa.cmp(pb).then(na.cmp(&nb)).then(a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Timepoints in chronological order.
///
/// When every id ends in a number the ids are the sort key; otherwise the
/// declared order already is the chronology and is returned as-is. The sort
/// is stable either way.
pub fn chronological(timepoints: &[Timepoint]) -> Vec<&Timepoint> {
    let mut ordered: Vec<&Timepoint> = timepoints.iter().collect();
    let all_numbered = timepoints
        .iter()
        .all(|tp| split_trailing_number(&tp.id).is_some());
    if all_numbered {
        ordered.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    }
    ordered
}
