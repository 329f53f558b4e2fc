use bytes::Bytes;
use serde_json::Value;

use graft_net::RawPayload;
use graft_types::Envelope;

/// Where an inbound payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Produced by this store: a put, a query, a storage reply.
    Local,
    /// Delivered by a transport from another store.
    Remote,
}

/// An inbound payload, decoded or not.
///
/// The `decode` hook turns the first three forms into an envelope. Payloads
/// that fail to decode travel on unchanged for later hooks to inspect.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Text(String),
    Bytes(Bytes),
    Json(Value),
    Envelope(Envelope),
}

impl Inbound {
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Envelope(env) => Some(env),
            _ => None,
        }
    }

    pub fn envelope_mut(&mut self) -> Option<&mut Envelope> {
        match self {
            Self::Envelope(env) => Some(env),
            _ => None,
        }
    }
}

impl From<Envelope> for Inbound {
    fn from(env: Envelope) -> Self {
        Self::Envelope(env)
    }
}

impl From<String> for Inbound {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Inbound {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for Inbound {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Value> for Inbound {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<RawPayload> for Inbound {
    fn from(raw: RawPayload) -> Self {
        match raw {
            RawPayload::Text(text) => Self::Text(text),
            RawPayload::Bytes(bytes) => Self::Bytes(bytes),
            RawPayload::Json(value) => Self::Json(value),
        }
    }
}

/// An outbound message: typed until the `encode` hook renders it.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Envelope(Envelope),
    Text(String),
}

/// The message carried through every stage of a store's hook bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// `create` and `opt`: the store is starting.
    Boot,
    /// `in`: a payload entered the store.
    Inbound { payload: Inbound, origin: Origin },
    /// `out`: a message is leaving for peers.
    Outbound(Outbound),
    /// `get`: read the record under `key`; answer with a storage reply
    /// correlated by `reply_to`.
    Fetch { key: String, reply_to: String },
    /// `put`: persist `record` text under `key`.
    Persist { key: String, record: String },
}

impl Signal {
    /// The inbound envelope, if this is a decoded `in` message.
    pub fn inbound_envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Inbound { payload, .. } => payload.envelope(),
            _ => None,
        }
    }
}
