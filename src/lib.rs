//! soa-reconcile: reconciliation engine for Schedule of Activities extractions
//!
//! Merges partial, independently produced extractions of an activity ×
//! timepoint matrix into one consistent record, without ever emitting an
//! entity or tick that no input contained.
//!
//! # Core Concepts
//!
//! - **Fragments**: partial records with locally-scoped ids, merged by the
//!   identity resolver into globally-keyed records
//! - **Sources**: a text pass and a vision pass over the same document,
//!   reconciled by the union-subset enforcer
//! - **Provenance**: which source contributed each entity and each tick
//! - **Schedule timeline**: one instance per timepoint, derived from the ticks
//!
//! # Example
//!
//! ```
//! use soa_reconcile::{Reconciler, SourceTag};
//! use serde_json::json;
//!
//! let text = json!({ "timeline": {
//!     "activities": [{ "id": "a1", "name": "ECG" }],
//!     "plannedTimepoints": [{ "id": "tp1", "name": "Screening" }],
//!     "activityTimepoints": [{ "activityId": "a1", "timepointId": "tp1" }]
//! }});
//! let vision = json!({ "timeline": {
//!     "activities": [{ "id": "v1", "name": "ecg" }],
//!     "plannedTimepoints": [{ "id": "tp1", "name": "Screening" }],
//!     "activityTimepoints": [["v1", "tp1"]]
//! }});
//!
//! let out = Reconciler::default().reconcile_sources(&text, &vision, None).unwrap();
//! assert_eq!(out.provenance.cell_tag("a1", "tp1"), Some(SourceTag::Both));
//! ```

pub mod config;
pub mod enforce;
pub mod normalize;
pub mod pipeline;
pub mod provenance;
mod record;
pub mod resolve;
pub mod storage;
pub mod timeline;

pub use config::ReconcileConfig;
pub use enforce::{EnforcementPolicy, EnforcementReport, TickDropReason, UnionSubsetEnforcer};
pub use normalize::{parse_record, NameKey, SourceIndex};
pub use pipeline::{Fragment, ReconcileOutput, Reconciler, RunReport};
pub use provenance::{ProvenanceMap, ProvenanceRecord, SourceTag};
pub use record::{
    chronological, natural_cmp, Activity, ActivityGroup, Encounter, EntityKind, ReconcileError,
    ReconcileResult, RecordEnvelope, ScheduleTimeline, ScheduledInstance, SoaRecord, Tick,
    Timepoint, DEFAULT_SCHEMA_VERSION,
};
pub use resolve::{IdMapping, IdentityResolver, MergeReport, Resolution};
pub use storage::{
    OpenStore, RunMode, RunStore, RunSummary, SqliteStore, StorageError, StorageResult, StoredRun,
};
pub use timeline::derive_timeline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
