//! Peer plumbing for Graft.
//!
//! Everything a store needs to talk to other stores, minus the store itself:
//!
//! - [`DedupRing`] -- bounded recent-history of envelope digests
//! - [`Peer`] -- capability to send encoded envelopes to one remote store
//! - [`BufferedPeer`] -- queues sends while its [`Link`] is down, flushes in order on reconnect
//! - [`ChannelNetwork`] / [`ChannelLink`] -- in-process transport over tokio channels
//! - [`TransportFactory`] -- turns peer URLs into peers and binds listeners
//!
//! Inbound traffic is handed to the store as a [`RawPayload`]; decoding is the
//! store's job.

pub mod buffered;
pub mod channel;
pub mod dedup;
pub mod error;
pub mod peer;

pub use buffered::{BufferedPeer, Link};
pub use channel::{ChannelLink, ChannelNetwork, ChannelPeer};
pub use dedup::{Digest, DedupRing};
pub use error::{NetError, NetResult};
pub use peer::{Inbox, Peer, PeerSpec, RawPayload, TransportFactory};
