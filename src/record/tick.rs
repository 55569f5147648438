//! Tick: the (activity, timepoint) relation at the heart of the matrix

use serde::{Deserialize, Serialize};

/// "This activity is performed at this timepoint."
///
/// Ticks have no identity beyond the pair; two ticks with the same
/// endpoints are the same tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub activity_id: String,
    pub timepoint_id: String,
}

impl Tick {
    pub fn new(activity_id: impl Into<String>, timepoint_id: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            timepoint_id: timepoint_id.into(),
        }
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} @ {})", self.activity_id, self.timepoint_id)
    }
}
