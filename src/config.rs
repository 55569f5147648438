//! Run configuration
//!
//! Read from YAML. Every field has a default, so an empty or partial file
//! is valid.

use crate::enforce::{EnforcementPolicy, DEFAULT_EARLY_TIMEPOINTS};
use crate::record::{ReconcileError, ReconcileResult, DEFAULT_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Size of the early-timepoint window for anti-smear; 0 disables it
    pub anti_smear_early_timepoints: usize,
    /// Merge same-named entities across fragments
    pub match_by_name: bool,
    /// Normalize fragments on the rayon pool
    pub parallel_ingest: bool,
    /// Written into the output envelope
    pub schema_version: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            anti_smear_early_timepoints: DEFAULT_EARLY_TIMEPOINTS,
            match_by_name: true,
            parallel_ingest: false,
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// `<config_dir>/soa-reconcile/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("soa-reconcile").join("config.yaml"))
    }

    pub fn from_yaml(yaml: &str) -> ReconcileResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ReconcileResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    /// An explicit path must exist; otherwise the default location is used
    /// when present, and built-in defaults when not.
    pub fn load(explicit: Option<&Path>) -> ReconcileResult<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match Self::default_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::from_path(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn enforcement_policy(&self) -> EnforcementPolicy {
        EnforcementPolicy::new().with_early_timepoints(self.anti_smear_early_timepoints)
    }
}
