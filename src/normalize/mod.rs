//! Input normalization
//!
//! - **shape**: variant raw JSON → canonical [`SoaRecord`](crate::record::SoaRecord)
//! - **name_key**: normalized names for cross-source matching
//! - **index**: per-source lookup tables built once and reused

mod index;
mod name_key;
mod shape;

pub use index::{Confirmation, SourceIndex};
pub use name_key::{names_compatible, NameKey};
pub use shape::{parse_record, MalformedFragment, Normalized};
