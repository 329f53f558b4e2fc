//! Version and merge engine for Graft.
//!
//! Conflict resolution is last-writer-wins over wall-clock timestamps:
//! a field's visible value is the newest version that is not in the future.
//! Histories only grow; merging appends, it never replaces.

pub mod record;
pub mod select;
pub mod structural;

pub use record::{absorb, decode_fields, materialize, merge_records, resolved_value, Absorbed};
pub use select::select_current;
pub use structural::merge_values;
