//! Storage for reconciled runs
//!
//! Runs are persisted through the `RunStore` trait. The primary
//! implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, RunMode, RunStore, RunSummary, StorageError, StorageResult, StoredRun};
