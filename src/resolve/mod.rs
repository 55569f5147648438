//! Identity resolution across fragments
//!
//! Each fragment uses its own ids (`tp1`, `act3`). The resolver gives every
//! entity one global id (`timepoint-1`, `activity-3`), collapses aliases and
//! same-named duplicates, and rewrites all foreign keys.

mod alias;
mod merger;
mod state;

pub use alias::alias_key;
pub use merger::{IdentityResolver, MergeReport, Resolution, SkippedFragment};
pub use state::{
    Declared, IdAllocator, IdMapping, LocalRef, MappingEntry, Reference, ResolverState,
};
