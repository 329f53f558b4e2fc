//! Storage adapter capability for Graft.
//!
//! The store core never talks to a database directly. It reads and writes
//! node records through a [`StorageAdapter`]: an asynchronous string-keyed,
//! string-valued map. Keys are serialized paths; values are the JSON text of
//! a node record.
//!
//! # Rules
//!
//! 1. `get` returning `Ok(None)` and `get` returning `Err` are both misses to
//!    the core. Adapters should still report errors so they can be logged.
//! 2. `put` replaces the whole value under a key.
//! 3. Adapters never interpret the value text.
//!
//! [`InMemoryStorage`] is the bundled adapter for tests and embedding.

pub mod adapter;
pub mod error;
pub mod memory;

pub use adapter::StorageAdapter;
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStorage, StorageOp};
