//! Record model shared by fragments, sources and the reconciled output

mod entity;
mod error;
mod order;
mod schedule;
mod soa;
mod tick;


pub use entity::{Activity, ActivityGroup, Encounter, EntityKind, Timepoint};
pub use error::{ReconcileError, ReconcileResult};
pub use order::{chronological, natural_cmp};
pub use schedule::{ScheduleTimeline, ScheduledInstance};
pub use soa::{RecordEnvelope, SoaRecord, DEFAULT_SCHEMA_VERSION};
pub use tick::Tick;
