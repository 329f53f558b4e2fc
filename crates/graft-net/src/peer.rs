use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{NetError, NetResult};

/// An inbound payload exactly as a transport received it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPayload {
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for RawPayload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Where transports deliver inbound payloads for a store.
pub type Inbox = mpsc::UnboundedSender<RawPayload>;

/// Capability to send encoded envelopes to one remote store.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Identifier for logs.
    fn id(&self) -> &str;

    /// Send one JSON-encoded envelope.
    ///
    /// Implementations that can lose their connection queue the text and
    /// deliver it once reconnected instead of failing.
    async fn send(&self, text: &str) -> NetResult<()>;
}

/// A configured peer: a URL to connect through the transport factory, or a
/// ready peer object.
#[derive(Clone)]
pub enum PeerSpec {
    Url(String),
    Peer(Arc<dyn Peer>),
}

impl fmt::Debug for PeerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Peer(peer) => f.debug_tuple("Peer").field(&peer.id()).finish(),
        }
    }
}

impl From<&str> for PeerSpec {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for PeerSpec {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<Arc<dyn Peer>> for PeerSpec {
    fn from(peer: Arc<dyn Peer>) -> Self {
        Self::Peer(peer)
    }
}

/// Turns peer URLs into peers and binds listeners for a store.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Open a peer for `url`.
    async fn connect(&self, url: &str) -> NetResult<Arc<dyn Peer>>;

    /// Accept connections at `addr`, delivering their payloads into `inbox`.
    async fn listen(&self, addr: &str, inbox: Inbox) -> NetResult<()> {
        let _ = (addr, inbox);
        Err(NetError::Unsupported("listen"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Null;

    #[async_trait]
    impl Peer for Null {
        fn id(&self) -> &str {
            "null"
        }
        async fn send(&self, _text: &str) -> NetResult<()> {
            Ok(())
        }
    }

    struct ConnectOnly;

    #[async_trait]
    impl TransportFactory for ConnectOnly {
        async fn connect(&self, _url: &str) -> NetResult<Arc<dyn Peer>> {
            Ok(Arc::new(Null))
        }
    }

    #[test]
    fn payload_conversions() {
        assert_eq!(RawPayload::from("x"), RawPayload::Text("x".into()));
        assert_eq!(
            RawPayload::from(vec![1u8, 2]),
            RawPayload::Bytes(Bytes::from_static(&[1, 2]))
        );
        assert_eq!(RawPayload::from(json!({"<": "a"})), RawPayload::Json(json!({"<": "a"})));
    }

    #[test]
    fn peer_spec_from_url_and_object() {
        assert!(matches!(PeerSpec::from("mem://a"), PeerSpec::Url(u) if u == "mem://a"));
        let peer: Arc<dyn Peer> = Arc::new(Null);
        let spec = PeerSpec::from(peer);
        assert_eq!(format!("{spec:?}"), r#"Peer("null")"#);
    }

    #[tokio::test]
    async fn listen_defaults_to_unsupported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = ConnectOnly.listen("anywhere", tx).await.unwrap_err();
        assert!(matches!(err, NetError::Unsupported("listen")));
        assert_eq!(ConnectOnly.connect("x").await.unwrap().id(), "null");
    }
}
