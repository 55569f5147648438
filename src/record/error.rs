//! Errors surfaced to callers of the reconciliation engine
//!
//! Per-fragment and per-entity problems are recovered locally and counted in
//! the run reports; only the conditions below reach the caller.

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Nothing usable was left after skipping malformed inputs
    #[error("no usable input: {0}")]
    EmptyInputSet(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_yaml::Error> for ReconcileError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
