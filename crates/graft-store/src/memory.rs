use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::adapter::StorageAdapter;
use crate::error::{StoreError, StoreResult};

/// One step observed by an [`InMemoryStorage`], in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageOp {
    GetStarted(String),
    GetFinished(String),
    PutStarted(String),
    PutFinished(String),
}

/// In-memory, `HashMap`-based storage adapter.
///
/// Intended for tests and embedding. An optional latency is slept (on the
/// tokio clock) inside every operation so callers observe a truly
/// asynchronous backend, and every operation is journaled.
pub struct InMemoryStorage {
    records: RwLock<HashMap<String, String>>,
    latency: Option<Duration>,
    failing: AtomicBool,
    journal: Mutex<Vec<StorageOp>>,
}

impl InMemoryStorage {
    /// Create a new empty store that answers immediately.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            latency: None,
            failing: AtomicBool::new(false),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Create a store that sleeps `latency` inside every get and put.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Seed a value without going through the journal.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.records
            .write()
            .expect("lock poisoned")
            .insert(key.into(), value.into());
    }

    /// Read a value without going through the journal.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.records.read().expect("lock poisoned").get(key).cloned()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().expect("lock poisoned").is_empty()
    }

    /// Sorted list of all stored keys.
    pub fn keys(&self) -> Vec<String> {
        let map = self.records.read().expect("lock poisoned");
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every operation observed so far.
    pub fn journal(&self) -> Vec<StorageOp> {
        self.journal.lock().expect("lock poisoned").clone()
    }

    /// Number of completed puts for `key`.
    pub fn put_count(&self, key: &str) -> usize {
        self.journal
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|op| matches!(op, StorageOp::PutFinished(k) if k == key))
            .count()
    }

    fn log(&self, op: StorageOp) {
        self.journal.lock().expect("lock poisoned").push(op);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store set to fail".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for InMemoryStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.log(StorageOp::GetStarted(key.to_owned()));
        self.delay().await;
        self.check()?;
        let value = self.peek(key);
        trace!(key, hit = value.is_some(), "memory get");
        self.log(StorageOp::GetFinished(key.to_owned()));
        Ok(value)
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.log(StorageOp::PutStarted(key.to_owned()));
        self.delay().await;
        self.check()?;
        trace!(key, bytes = value.len(), "memory put");
        self.records
            .write()
            .expect("lock poisoned")
            .insert(key.to_owned(), value);
        self.log(StorageOp::PutFinished(key.to_owned()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("record_count", &self.len())
            .field("latency", &self.latency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = InMemoryStorage::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryStorage::new();
        store.put("account", "{}".into()).await.unwrap();
        assert_eq!(store.get("account").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn put_replaces() {
        let store = InMemoryStorage::new();
        store.put("k", "1".into()).await.unwrap();
        store.put("k", "2".into()).await.unwrap();
        assert_eq!(store.peek("k").as_deref(), Some("2"));
        assert_eq!(store.put_count("k"), 2);
    }

    #[tokio::test]
    async fn failing_store_reports_errors() {
        let store = InMemoryStorage::new();
        store.insert("k", "v");
        store.set_failing(true);
        assert!(matches!(store.get("k").await, Err(StoreError::Unavailable(_))));
        assert!(store.put("k", "w".into()).await.is_err());
        store.set_failing(false);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn journal_records_order() {
        let store = InMemoryStorage::new();
        store.get("a").await.unwrap();
        store.put("a", "x".into()).await.unwrap();
        assert_eq!(
            store.journal(),
            vec![
                StorageOp::GetStarted("a".into()),
                StorageOp::GetFinished("a".into()),
                StorageOp::PutStarted("a".into()),
                StorageOp::PutFinished("a".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_slept() {
        let store = InMemoryStorage::with_latency(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        store.put("k", "v".into()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn keys_are_sorted() {
        let store = InMemoryStorage::new();
        store.insert("b", "");
        store.insert("a", "");
        assert_eq!(store.keys(), vec!["a", "b"]);
    }
}
