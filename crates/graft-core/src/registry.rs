use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::trace;

/// Pending storage reads keyed by correlation key.
///
/// Every waiter on a key is resumed exactly once, by the first reply for
/// that key after it registered: the reply takes the whole queue and leaves
/// it empty. A reply arriving while nobody waits is dropped.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    waiting: Mutex<HashMap<String, Vec<oneshot::Sender<Option<String>>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a waiter on `key`.
    ///
    /// Returns the waiter and whether it is the first in the queue; only the
    /// first should start a read, the others ride along on its reply.
    pub fn wait(&self, key: &str) -> (oneshot::Receiver<Option<String>>, bool) {
        let (tx, rx) = oneshot::channel();
        let mut waiting = self.waiting.lock().expect("registry lock poisoned");
        let queue = waiting.entry(key.to_owned()).or_default();
        queue.push(tx);
        (rx, queue.len() == 1)
    }

    /// Resume everyone waiting on `key` with `record`. Returns how many were
    /// resumed.
    pub fn drain(&self, key: &str, record: Option<String>) -> usize {
        let queue = self
            .waiting
            .lock()
            .expect("registry lock poisoned")
            .remove(key)
            .unwrap_or_default();
        let resumed = queue.len();
        for waiter in queue {
            // A waiter that gave up has dropped its receiver.
            let _ = waiter.send(record.clone());
        }
        trace!(key, resumed, hit = record.is_some(), "storage reply drained");
        resumed
    }

    pub fn is_waiting(&self, key: &str) -> bool {
        self.waiting
            .lock()
            .expect("registry lock poisoned")
            .contains_key(key)
    }
}
