//! One-shot, live and fan-out queries on a [`crate::Context`].
//!
//! Every query listens on its context's path before asking for it, so an
//! answer produced while the request is still being dispatched is not
//! missed.

mod map;
mod on;
mod once;

pub use map::MapQuery;
