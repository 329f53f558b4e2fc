//! In-process transport over tokio channels.
//!
//! A [`ChannelNetwork`] is a shared broker mapping addresses to store inboxes.
//! Stores `listen` on an address; other stores `connect` to it and get a
//! [`ChannelPeer`] that writes straight into the listener's inbox.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::buffered::{BufferedPeer, Link};
use crate::error::{NetError, NetResult};
use crate::peer::{Inbox, Peer, RawPayload, TransportFactory};

/// Link into another store's inbox. Can be taken down and brought back to
/// simulate connection loss.
#[derive(Debug)]
pub struct ChannelLink {
    target: String,
    inbox: Inbox,
    up: AtomicBool,
}

impl ChannelLink {
    pub fn new(target: impl Into<String>, inbox: Inbox) -> Self {
        Self {
            target: target.into(),
            inbox,
            up: AtomicBool::new(true),
        }
    }

    pub fn disconnect(&self) {
        self.up.store(false, Ordering::SeqCst);
    }

    pub fn connect(&self) {
        self.up.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Link for ChannelLink {
    fn is_connected(&self) -> bool {
        self.up.load(Ordering::SeqCst) && !self.inbox.is_closed()
    }

    async fn transmit(&self, text: &str) -> NetResult<()> {
        self.inbox
            .send(RawPayload::Text(text.to_owned()))
            .map_err(|_| NetError::Closed(self.target.clone()))
    }
}

/// A buffered peer over an in-process channel.
pub type ChannelPeer = BufferedPeer<ChannelLink>;

impl BufferedPeer<ChannelLink> {
    /// Peer delivering into `inbox`.
    pub fn channel(id: impl Into<String>, inbox: Inbox) -> Self {
        let id = id.into();
        let link = ChannelLink::new(id.clone(), inbox);
        Self::new(id, link)
    }

    /// Take the link down; later sends queue.
    pub fn disconnect(&self) {
        self.link().disconnect();
    }

    /// Bring the link back and flush everything queued meanwhile.
    pub async fn reconnect(&self) -> NetResult<usize> {
        self.link().connect();
        self.flush().await
    }
}

/// Shared broker routing addresses to store inboxes.
#[derive(Clone, Debug, Default)]
pub struct ChannelNetwork {
    inboxes: Arc<RwLock<HashMap<String, Inbox>>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `inbox` reachable at `addr`, replacing any previous listener.
    pub fn register(&self, addr: impl Into<String>, inbox: Inbox) {
        let addr = addr.into();
        debug!(%addr, "channel listener registered");
        self.inboxes
            .write()
            .expect("lock poisoned")
            .insert(addr, inbox);
    }

    pub fn addresses(&self) -> Vec<String> {
        let map = self.inboxes.read().expect("lock poisoned");
        let mut addrs: Vec<String> = map.keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// A concrete peer for `addr`, for callers that want to drive its link.
    pub fn open(&self, addr: &str) -> NetResult<Arc<ChannelPeer>> {
        let inbox = self
            .inboxes
            .read()
            .expect("lock poisoned")
            .get(addr)
            .cloned()
            .ok_or_else(|| NetError::UnknownPeer(addr.to_owned()))?;
        Ok(Arc::new(ChannelPeer::channel(addr, inbox)))
    }
}

#[async_trait]
impl TransportFactory for ChannelNetwork {
    async fn connect(&self, url: &str) -> NetResult<Arc<dyn Peer>> {
        let peer: Arc<dyn Peer> = self.open(url)?;
        Ok(peer)
    }

    async fn listen(&self, addr: &str, inbox: Inbox) -> NetResult<()> {
        self.register(addr, inbox);
        Ok(())
    }
}
