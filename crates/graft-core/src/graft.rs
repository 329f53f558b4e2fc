use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use graft_bus::{Dispatch, Hook, HookBus, Stage};
use graft_net::{DedupRing, Inbox, Peer, PeerSpec, RawPayload, TransportFactory};
use graft_store::StorageAdapter;
use graft_types::{Clock, Envelope, Record, SystemClock, Timestamp};

use crate::config::GraftConfig;
use crate::context::{Context, Key};
use crate::error::GraftResult;
use crate::listeners::Subscriptions;
use crate::pipeline;
use crate::registry::ListenerRegistry;
use crate::signal::{Inbound, Origin, Outbound, Signal};

/// A hook on a store's bus.
pub type GraftHook = Arc<dyn Hook<Graft, Signal>>;

/// A store root.
///
/// Cheap to clone: every clone is a handle to the same store. The root owns
/// its hook bus, de-duplication window, listener registries and write lock;
/// nothing is process-wide, so any number of independent stores can live in
/// one process.
#[derive(Clone)]
pub struct Graft {
    inner: Arc<Inner>,
}

struct Inner {
    config: GraftConfig,
    bus: HookBus<Graft, Signal>,
    clock: Arc<dyn Clock>,
    transport: Option<Arc<dyn TransportFactory>>,
    peers: RwLock<Vec<Arc<dyn Peer>>>,
    dedup: Mutex<DedupRing>,
    registry: ListenerRegistry,
    subscriptions: Subscriptions,
    write_lock: tokio::sync::Mutex<()>,
    read_seq: AtomicU64,
    inbox: Inbox,
}

/// Non-owning handle held by long-lived listeners.
#[derive(Clone)]
pub(crate) struct WeakGraft(Weak<Inner>);

impl WeakGraft {
    pub fn upgrade(&self) -> Option<Graft> {
        self.0.upgrade().map(|inner| Graft { inner })
    }
}

impl Graft {
    pub fn builder() -> GraftBuilder {
        GraftBuilder::default()
    }

    /// A store with default options, no storage and no peers.
    pub async fn new() -> GraftResult<Self> {
        Self::builder().build().await
    }

    /// Context at the root path.
    pub fn root(&self) -> Context {
        Context::root(self.clone())
    }

    /// Shorthand for `root().get(key)`.
    pub fn get(&self, key: impl Into<Key>) -> Context {
        self.root().get(key)
    }

    pub fn config(&self) -> &GraftConfig {
        &self.inner.config
    }

    pub fn separator(&self) -> &str {
        &self.inner.config.separator
    }

    pub fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    pub fn bus(&self) -> &HookBus<Graft, Signal> {
        &self.inner.bus
    }

    /// Append a hook to `stage`. Dispatches already running are unaffected.
    pub fn register(&self, stage: Stage, hook: GraftHook) {
        self.inner.bus.register(stage, hook);
    }

    pub fn add_peer(&self, peer: Arc<dyn Peer>) {
        debug!(peer = peer.id(), "peer added");
        self.inner.peers.write().expect("peer list lock poisoned").push(peer);
    }

    pub fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.inner.peers.read().expect("peer list lock poisoned").clone()
    }

    pub fn transport(&self) -> Option<&Arc<dyn TransportFactory>> {
        self.inner.transport.as_ref()
    }

    /// Sender transports use to deliver payloads into this store.
    pub fn inbox(&self) -> Inbox {
        self.inner.inbox.clone()
    }

    /// Feed a payload received from another store into the `in` stage.
    pub async fn ingest(&self, payload: impl Into<Inbound>) {
        self.inject(payload, Origin::Remote).await;
    }

    /// Run `stage` over `signal` with this store as the hook context.
    pub async fn dispatch(&self, stage: Stage, signal: Signal) -> Dispatch<Signal> {
        self.inner.bus.dispatch(stage, self, signal).await
    }

    /// Feed a payload into the `in` stage.
    pub async fn inject(&self, payload: impl Into<Inbound>, origin: Origin) {
        let signal = Signal::Inbound {
            payload: payload.into(),
            origin,
        };
        self.dispatch(Stage::In, signal).await;
    }

    pub(crate) fn downgrade(&self) -> WeakGraft {
        WeakGraft(Arc::downgrade(&self.inner))
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    pub(crate) fn registry(&self) -> &ListenerRegistry {
        &self.inner.registry
    }

    pub(crate) fn subscriptions(&self) -> &Subscriptions {
        &self.inner.subscriptions
    }

    pub(crate) fn write_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.inner.write_lock
    }

    /// Remember `text` in the de-duplication window. Returns `true` if it
    /// was already there.
    pub(crate) fn seen_before(&self, text: &str) -> bool {
        let mut ring = self.inner.dedup.lock().expect("dedup lock poisoned");
        let digest = DedupRing::digest(text);
        let fresh = ring.record(digest);
        if !fresh {
            debug!(digest = %DedupRing::short(&digest), "envelope seen before");
        }
        !fresh
    }

    /// Inject a request for `path` from a background task.
    pub(crate) fn request_later(&self, path: String) {
        let graft = self.clone();
        tokio::spawn(async move {
            graft.inject(Envelope::request(path), Origin::Local).await;
        });
    }

    /// Deliver a locally produced answer: listeners on its subject first,
    /// then peers.
    pub(crate) async fn respond(&self, mut env: Envelope) {
        env.transmitted.get_or_insert_with(|| self.now());
        if let Some(subject) = env.subject() {
            self.inner.subscriptions.notify(subject, &env);
        }
        self.dispatch(Stage::Out, Signal::Outbound(Outbound::Envelope(env)))
            .await;
    }

    /// Read the record under `key`, sharing any read already in flight for
    /// the same key.
    pub(crate) async fn fetch(&self, key: &str) -> Option<Record> {
        let text = self.read(key, key.to_owned()).await?;
        decode_record(key, &text)
    }

    /// Read the record under `key` with a private correlation key, so the
    /// answer cannot come from a read that started before this call.
    pub(crate) async fn fetch_fresh(&self, key: &str) -> Option<Record> {
        let seq = self.inner.read_seq.fetch_add(1, Ordering::Relaxed);
        let text = self.read(key, format!("{key}\u{0}{seq}")).await?;
        decode_record(key, &text)
    }

    async fn read(&self, key: &str, reply_to: String) -> Option<String> {
        let (waiter, first) = self.inner.registry.wait(&reply_to);
        if first {
            // The read outlives its first caller so later waiters on the
            // same key are always answered.
            let graft = self.clone();
            let fetch = Signal::Fetch {
                key: key.to_owned(),
                reply_to: reply_to.clone(),
            };
            tokio::spawn(async move {
                // Nobody halted: nothing answered, so report a miss.
                if let Dispatch::Completed(_) = graft.dispatch(Stage::Get, fetch).await {
                    graft
                        .inject(Envelope::storage_reply(reply_to, None), Origin::Local)
                        .await;
                }
            });
        }
        waiter.await.ok().flatten()
    }

    /// Hand `record` to the `put` stage under `key`.
    pub(crate) async fn persist(&self, key: &str, record: &Record) {
        match record.to_json() {
            Ok(text) => {
                let persist = Signal::Persist {
                    key: key.to_owned(),
                    record: text,
                };
                self.dispatch(Stage::Put, persist).await;
            }
            Err(err) => warn!(key, error = %err, "record could not be encoded; not persisted"),
        }
    }
}

fn decode_record(key: &str, text: &str) -> Option<Record> {
    match Record::from_json(text) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(key, error = %err, "stored record is unreadable; treating as missing");
            None
        }
    }
}

impl std::fmt::Debug for Graft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graft")
            .field("config", &self.inner.config)
            .field("bus", &self.inner.bus)
            .field("peers", &self.peers().len())
            .finish()
    }
}

/// Assembles a [`Graft`] from options and collaborators.
#[derive(Default)]
pub struct GraftBuilder {
    config: GraftConfig,
    storage: Option<Arc<dyn StorageAdapter>>,
    peers: Vec<PeerSpec>,
    transport: Option<Arc<dyn TransportFactory>>,
    clock: Option<Arc<dyn Clock>>,
    hooks: Vec<(Stage, GraftHook)>,
}

impl GraftBuilder {
    pub fn config(mut self, config: GraftConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Add a peer URL (connected through the transport factory) or a ready
    /// peer object.
    pub fn peer(mut self, peer: impl Into<PeerSpec>) -> Self {
        self.peers.push(peer.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn TransportFactory>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Add a hook after the built-in ones on `stage`.
    pub fn hook(mut self, stage: Stage, hook: GraftHook) -> Self {
        self.hooks.push((stage, hook));
        self
    }

    /// Build the store and run its `create` stage.
    ///
    /// Must be called inside a tokio runtime: the store's inbox is drained by
    /// a background task.
    pub async fn build(self) -> GraftResult<Graft> {
        let mut config = self.config;
        config.validate()?;

        let mut ready = Vec::new();
        for spec in self.peers {
            match spec {
                PeerSpec::Url(url) => config.peers.push(url),
                PeerSpec::Peer(peer) => ready.push(peer),
            }
        }

        let (inbox, rx) = mpsc::unbounded_channel();
        let graft = Graft {
            inner: Arc::new(Inner {
                dedup: Mutex::new(DedupRing::new(config.dedup_capacity)),
                config,
                bus: HookBus::new(),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                transport: self.transport,
                peers: RwLock::new(ready),
                registry: ListenerRegistry::new(),
                subscriptions: Subscriptions::default(),
                write_lock: tokio::sync::Mutex::new(()),
                read_seq: AtomicU64::new(0),
                inbox,
            }),
        };

        pipeline::install(&graft, self.storage);
        for (stage, hook) in self.hooks {
            graft.register(stage, hook);
        }
        drain_inbox(graft.downgrade(), rx);

        info!(
            separator = %graft.separator(),
            peers = graft.config().peers.len() + graft.peers().len(),
            listen = ?graft.config().listen,
            "graft store created"
        );
        graft.dispatch(Stage::Create, Signal::Boot).await;
        Ok(graft)
    }
}

/// Feed transport deliveries into the store until it is dropped.
fn drain_inbox(store: WeakGraft, mut rx: mpsc::UnboundedReceiver<RawPayload>) {
    tokio::spawn(async move {
        while let Some(raw) = rx.recv().await {
            let Some(graft) = store.upgrade() else {
                break;
            };
            graft.ingest(raw).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_bus::Observer;
    use graft_store::InMemoryStorage;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn built_in_hooks_are_installed_in_order() {
        let graft = Graft::builder()
            .storage(Arc::new(InMemoryStorage::new()))
            .build()
            .await
            .unwrap();
        assert_eq!(
            graft.bus().handler_names(Stage::In),
            vec!["decode", "stamp", "dedup", "retransmit", "replies", "notify", "resolve", "write"]
        );
        assert_eq!(graft.bus().handler_names(Stage::Out), vec!["encode", "fan-out"]);
        assert_eq!(graft.bus().handler_names(Stage::Get), vec!["storage-read"]);
        assert_eq!(graft.bus().handler_names(Stage::Put), vec!["storage-write", "echo"]);
    }

    #[tokio::test]
    async fn storage_hooks_absent_without_adapter() {
        let graft = Graft::new().await.unwrap();
        assert_eq!(graft.bus().handler_count(Stage::Get), 0);
        assert_eq!(graft.bus().handler_names(Stage::Put), vec!["echo"]);
    }

    #[tokio::test]
    async fn builder_hooks_run_after_built_ins() {
        let graft = Graft::builder()
            .hook(Stage::Out, Arc::new(Observer::new("tap", |_: &Graft, _: &Signal| {})))
            .build()
            .await
            .unwrap();
        assert_eq!(graft.bus().handler_names(Stage::Out), vec!["encode", "fan-out", "tap"]);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = GraftConfig {
            separator: String::new(),
            ..GraftConfig::default()
        };
        assert!(Graft::builder().config(config).build().await.is_err());
    }

    #[tokio::test]
    async fn read_without_storage_is_a_miss() {
        let graft = Graft::new().await.unwrap();
        assert!(graft.fetch("anything").await.is_none());
        assert!(graft.fetch_fresh("anything").await.is_none());
    }

    #[tokio::test]
    async fn read_returns_stored_record() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("account", r#"{"admin":[{"@":1,">":"account/admin"}]}"#);
        let graft = Graft::builder().storage(storage).build().await.unwrap();
        let record = graft.fetch("account").await.unwrap();
        assert_eq!(record.versions("admin")[0].target(), Some("account/admin"));
    }

    #[tokio::test]
    async fn unreadable_record_is_a_miss() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("account", "[1,2,3]");
        let graft = Graft::builder().storage(storage).build().await.unwrap();
        assert!(graft.fetch("account").await.is_none());
    }

    #[tokio::test]
    async fn storage_errors_are_misses() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("account", "{}");
        storage.set_failing(true);
        let graft = Graft::builder().storage(storage).build().await.unwrap();
        assert!(graft.fetch("account").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_read_still_answers_later_readers() {
        let storage = Arc::new(InMemoryStorage::with_latency(Duration::from_millis(20)));
        storage.insert("account", r#"{"admin":[{"@":1,">":"account/admin"}]}"#);
        let graft = Graft::builder().storage(storage).build().await.unwrap();

        let first = graft.fetch("account");
        assert!(tokio::time::timeout(Duration::from_millis(5), first).await.is_err());
        assert!(graft.fetch("account").await.is_some());
        assert!(!graft.inner.registry.is_waiting("account"));
    }

    #[tokio::test]
    async fn persist_reaches_adapter() {
        let storage = Arc::new(InMemoryStorage::new());
        let graft = Graft::builder().storage(storage.clone()).build().await.unwrap();
        let record: Record = serde_json::from_value(json!({"a": [{"@": 1, "=": 1}]})).unwrap();
        graft.persist("k", &record).await;
        let stored = Record::from_json(&storage.peek("k").unwrap()).unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn dedup_window_remembers_text() {
        let graft = Graft::new().await.unwrap();
        assert!(!graft.seen_before("x"));
        assert!(graft.seen_before("x"));
    }
}
