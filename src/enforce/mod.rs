//! Union-subset enforcement with the anti-smear tie-break
//!
//! Nothing leaves reconciliation unless one of the raw sources declared it.

mod enforcer;
mod policy;
mod proposal;
mod report;

pub use enforcer::{Enforcement, UnionSubsetEnforcer};
pub use policy::{EnforcementPolicy, Governance, DEFAULT_EARLY_TIMEPOINTS};
pub use proposal::union_proposal;
pub use report::{DroppedTick, EnforcementReport, TickDropReason};
