//! Tie-break policy for ticks the two sources disagree on

use crate::normalize::SourceIndex;

/// Number of leading timepoints subject to the anti-smear check
pub const DEFAULT_EARLY_TIMEPOINTS: usize = 3;

/// Tunables of the union-subset enforcer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcementPolicy {
    /// How many of the chronologically first timepoints count as "early".
    /// Zero disables anti-smear.
    pub early_timepoints: usize,
}

impl Default for EnforcementPolicy {
    fn default() -> Self {
        Self {
            early_timepoints: DEFAULT_EARLY_TIMEPOINTS,
        }
    }
}

impl EnforcementPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_early_timepoints(mut self, n: usize) -> Self {
        self.early_timepoints = n;
        self
    }
}

/// Which source has the final word on a timepoint's column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Governance {
    /// The vision pass declared the timepoint
    Vision,
    /// Only the text pass declared it
    Text,
    /// Neither pass declared it
    Ungoverned,
}

impl Governance {
    pub fn of(timepoint_id: &str, text: &SourceIndex, vision: &SourceIndex) -> Self {
        if vision.has_timepoint(timepoint_id) {
            Self::Vision
        } else if text.has_timepoint(timepoint_id) {
            Self::Text
        } else {
            Self::Ungoverned
        }
    }
}
