use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use graft_types::Envelope;

/// Identifies one logical query across every path it listens on.
pub type SubscriptionId = Uuid;

/// Receives envelopes addressed to a path a query listens on.
///
/// Called synchronously from inside the `in` stage; implementations must not
/// block and must not hold their own locks while calling user code that
/// could re-enter the store.
pub(crate) trait Listener: Send + Sync {
    fn notify(self: Arc<Self>, env: &Envelope);
}

type Entry = (SubscriptionId, Arc<dyn Listener>);

/// Application-level listeners keyed by subject path.
#[derive(Default)]
pub(crate) struct Subscriptions {
    by_path: Mutex<HashMap<String, Vec<Entry>>>,
}

impl Subscriptions {
    /// Listen on `path`. A subscription is only added once per path.
    pub fn add(&self, path: &str, id: SubscriptionId, listener: Arc<dyn Listener>) -> bool {
        let mut by_path = self.by_path.lock().expect("subscription lock poisoned");
        let entries = by_path.entry(path.to_owned()).or_default();
        if entries.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        entries.push((id, listener));
        true
    }

    pub fn remove(&self, path: &str, id: SubscriptionId) {
        let mut by_path = self.by_path.lock().expect("subscription lock poisoned");
        if let Some(entries) = by_path.get_mut(path) {
            entries.retain(|(existing, _)| *existing != id);
            if entries.is_empty() {
                by_path.remove(path);
            }
        }
    }

    /// Hand `env` to every listener on `path`. Returns how many were called.
    pub fn notify(&self, path: &str, env: &Envelope) -> usize {
        let listeners: Vec<Arc<dyn Listener>> = self
            .by_path
            .lock()
            .expect("subscription lock poisoned")
            .get(path)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        let called = listeners.len();
        for listener in listeners {
            listener.notify(env);
        }
        called
    }

    pub fn count(&self, path: &str) -> usize {
        self.by_path
            .lock()
            .expect("subscription lock poisoned")
            .get(path)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths = self
            .by_path
            .lock()
            .map(|by_path| by_path.len())
            .unwrap_or_default();
        f.debug_struct("Subscriptions").field("paths", &paths).finish()
    }
}
