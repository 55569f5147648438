//! Storage trait definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Unknown run mode: {0}")]
    UnknownMode(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Which entry point produced a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fragments merged by the identity resolver
    Merge,
    /// Text and vision sources reconciled through the enforcer
    Reconcile,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Reconcile => "reconcile",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunMode {
    type Err = StorageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "reconcile" => Ok(Self::Reconcile),
            other => Err(StorageError::UnknownMode(other.to_string())),
        }
    }
}

/// One persisted reconciliation: the record, its provenance and the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub mode: RunMode,
    pub record: Value,
    pub provenance: Value,
    pub report: Value,
}

impl StoredRun {
    /// A new run with a fresh v4 id, stamped now
    pub fn new(mode: RunMode, record: Value, provenance: Value, report: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            mode,
            record,
            provenance,
            report,
        }
    }
}

/// Listing row for a stored run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub mode: RunMode,
}

/// Persistence sink for reconciled runs
///
/// Implementations must be thread-safe (Send + Sync).
pub trait RunStore: Send + Sync {
    /// Save a run (insert or replace by id)
    fn save_run(&self, run: &StoredRun) -> StorageResult<()>;

    /// Load a run by id
    fn load_run(&self, id: &str) -> StorageResult<Option<StoredRun>>;

    /// All runs, newest first
    fn list_runs(&self) -> StorageResult<Vec<RunSummary>>;

    /// Delete a run; returns whether it existed
    fn delete_run(&self, id: &str) -> StorageResult<bool>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RunStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
