//! Graft store engine.
//!
//! A [`Graft`] is a store root: a path-addressed graph of records whose
//! fields carry timestamped version histories, merged last-writer-wins and
//! replicated to peers by flooding envelopes. Everything the store does
//! runs as hooks on its bus:
//!
//! - `create` / `opt` -- bootstrap, connect configured peers
//! - `in` -- decode, de-duplicate, retransmit, notify queries, resolve
//!   requests, serialize writes
//! - `out` -- encode and fan out to peers
//! - `get` / `put` -- the storage adapter
//!
//! Callers work through [`Context`]s: `graft.get("account/admin")` names a
//! location, [`Context::put`] writes there, and [`Context::once`],
//! [`Context::on`] and [`Context::map`] read from it.

pub mod config;
pub mod context;
mod decompose;
pub mod error;
pub mod graft;
mod listeners;
pub mod pipeline;
mod query;
pub mod registry;
mod resolve;
pub mod signal;
mod writer;

#[cfg(test)]
mod testing;

pub use config::GraftConfig;
pub use context::{Context, Key, PutValue, QueryOptions};
pub use error::{GraftError, GraftResult};
pub use graft::{Graft, GraftBuilder, GraftHook};
pub use listeners::SubscriptionId;
pub use query::MapQuery;
pub use registry::ListenerRegistry;
pub use signal::{Inbound, Origin, Outbound, Signal};

// Re-export the pieces hooks are written against
pub use graft_bus::{Dispatch, Flow, Hook, Observer, Stage};
