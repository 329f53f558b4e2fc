//! Foundation types for Graft.
//!
//! Graft is a peer-replicated, path-addressed graph store. This crate holds
//! the data model every other Graft crate builds on.
//!
//! # Key Types
//!
//! - [`Path`] — Ordered segment list addressing a graph location
//! - [`Version`] — Timestamped scalar value or reference in a field's history
//! - [`Record`] — Stored unit: field name to ordered version list
//! - [`Envelope`] — Message flowing through the `in`/`out` stages, with its JSON wire codec
//! - [`Clock`] — Injectable time source for conflict resolution

pub mod clock;
pub mod envelope;
pub mod error;
pub mod path;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use envelope::{keys, Body, Envelope};
pub use error::{CodecError, CodecResult};
pub use path::Path;
pub use version::{Payload, Record, Version};
