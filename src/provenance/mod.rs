//! Provenance: which source contributed each entity and each tick

mod attribution;
mod types;

pub use attribution::{attribute_fragments, attribute_sources, cell_provenance};
pub use types::{CellProvenance, ProvenanceMap, ProvenanceRecord, SourceTag};
