//! Bridges between the `get`/`put` stages and a [`StorageAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, trace, warn};

use graft_bus::{Flow, Hook};
use graft_store::StorageAdapter;
use graft_types::Envelope;

use crate::graft::Graft;
use crate::signal::{Origin, Signal};

/// Answers `get` from the adapter. A hit is injected as a storage reply and
/// ends the stage; a miss or an error lets later hooks try.
pub struct StorageReadHook {
    adapter: Arc<dyn StorageAdapter>,
}

impl StorageReadHook {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Hook<Graft, Signal> for StorageReadHook {
    fn name(&self) -> &str {
        "storage-read"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let (key, reply_to) = match &signal {
            Signal::Fetch { key, reply_to } => (key.clone(), reply_to.clone()),
            _ => return Flow::Continue(signal),
        };
        match self.adapter.get(&key).await {
            Ok(Some(record)) => {
                trace!(key = %key, adapter = self.adapter.name(), "storage hit");
                graft
                    .inject(Envelope::storage_reply(reply_to, Some(record)), Origin::Local)
                    .await;
                Flow::Halt
            }
            Ok(None) => Flow::Continue(signal),
            Err(err) => {
                warn!(key = %key, adapter = self.adapter.name(), error = %err, "storage read failed; treating as miss");
                Flow::Continue(signal)
            }
        }
    }
}

/// Persists records handed to `put`. Failures are logged, not retried.
pub struct StorageWriteHook {
    adapter: Arc<dyn StorageAdapter>,
}

impl StorageWriteHook {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl Hook<Graft, Signal> for StorageWriteHook {
    fn name(&self) -> &str {
        "storage-write"
    }

    async fn call(&self, _graft: &Graft, signal: Signal) -> Flow<Signal> {
        if let Signal::Persist { key, record } = &signal {
            if let Err(err) = self.adapter.put(key, record.clone()).await {
                error!(key = %key, adapter = self.adapter.name(), error = %err, "storage write failed");
            }
        }
        Flow::Continue(signal)
    }
}

/// Replays every persisted record as a storage reply, so readers already
/// waiting on that key see the new state.
pub struct EchoHook;

#[async_trait]
impl Hook<Graft, Signal> for EchoHook {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        if let Signal::Persist { key, record } = &signal {
            graft
                .inject(
                    Envelope::storage_reply(key.clone(), Some(record.clone())),
                    Origin::Local,
                )
                .await;
        }
        Flow::Continue(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_bus::{Dispatch, Stage};
    use graft_store::InMemoryStorage;

    async fn store_with(storage: Arc<InMemoryStorage>) -> Graft {
        Graft::builder().storage(storage).build().await.unwrap()
    }

    fn fetch(key: &str) -> Signal {
        Signal::Fetch {
            key: key.into(),
            reply_to: key.into(),
        }
    }

    #[tokio::test]
    async fn hit_halts_get_and_answers_waiter() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("account", "{}");
        let graft = store_with(storage).await;
        let (waiter, _) = graft.registry().wait("account");
        let outcome = graft.dispatch(Stage::Get, fetch("account")).await;
        assert_eq!(outcome, Dispatch::Halted { by: "storage-read".into() });
        assert_eq!(waiter.await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn miss_completes_get() {
        let graft = store_with(Arc::new(InMemoryStorage::new())).await;
        assert!(graft.dispatch(Stage::Get, fetch("nope")).await.is_completed());
    }

    #[tokio::test]
    async fn write_failure_is_logged_and_echo_still_runs() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.set_failing(true);
        let graft = store_with(storage.clone()).await;
        let (waiter, _) = graft.registry().wait("k");
        let outcome = graft
            .dispatch(
                Stage::Put,
                Signal::Persist {
                    key: "k".into(),
                    record: "{}".into(),
                },
            )
            .await;
        assert!(outcome.is_completed());
        assert!(storage.peek("k").is_none());
        assert_eq!(waiter.await.unwrap().as_deref(), Some("{}"));
    }
}
