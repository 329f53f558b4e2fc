use async_trait::async_trait;

use crate::error::StoreResult;

/// Asynchronous key-value backend holding serialized node records.
///
/// Implementations must be safe to share across tasks. The core serializes
/// its own read-merge-write cycles, so adapters need no per-key locking.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Fetch the record text stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "storage"
    }
}
