//! Serialized read-merge-write of elementary writes.
//!
//! A write to `a/b/c` lands in field `c` of the record its parent path
//! resolves to. Walking from the top-level record, each intermediate segment
//! must be a reference edge; a missing (or non-reference) edge is created
//! pointing at the joined child path, and existing edges are followed. The
//! whole cycle runs under the store's write lock, which grants in FIFO order,
//! so no two cycles overlap and none reads state older than the previous
//! cycle's result.

use tracing::{debug, trace};

use graft_merge::{absorb, select_current, Absorbed};
use graft_types::{Envelope, Version};

use crate::graft::Graft;
use crate::signal::Origin;

/// Merge `version` into the field addressed by `path`, then ask for every
/// record the cycle persisted so live queries on them hear about the change.
pub(crate) async fn write(graft: &Graft, path: &str, version: Version) {
    let separator = graft.separator();
    let segments: Vec<&str> = path.split(separator).filter(|s| !s.is_empty()).collect();
    let Some((field, parents)) = segments.split_last() else {
        return;
    };
    let Some((top, intermediate)) = parents.split_first() else {
        debug!(path, "top-level write ignored; top-level records are implicit");
        return;
    };

    let mut touched = Vec::new();
    {
        let _cycle = graft.write_lock().lock().await;
        let mut key = (*top).to_owned();
        for segment in intermediate {
            key = ensure_edge(graft, &key, segment, &mut touched).await;
        }
        let mut record = graft.fetch_fresh(&key).await.unwrap_or_default();
        let timestamp = version.timestamp;
        if absorb(&mut record, field, version) == Absorbed::Appended {
            graft.persist(&key, &record).await;
            trace!(path, key = %key, field, timestamp, "write merged");
            touched.push(key);
        }
    }

    for key in touched {
        graft.inject(Envelope::request(key), Origin::Local).await;
    }
}

/// Make field `segment` of record `key` a reference and return its target.
/// A record that had to change is added to `touched`.
async fn ensure_edge(graft: &Graft, key: &str, segment: &str, touched: &mut Vec<String>) -> String {
    let mut record = graft.fetch_fresh(key).await.unwrap_or_default();
    let now = graft.now();
    if let Some(target) = select_current(record.versions(segment), now).and_then(Version::target) {
        return target.to_owned();
    }
    let child = format!("{key}{}{segment}", graft.separator());
    absorb(&mut record, segment, Version::reference(now, child.clone()));
    graft.persist(key, &record).await;
    debug!(key, segment, target = %child, "parent edge created");
    touched.push(key.to_owned());
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_store::{InMemoryStorage, StorageOp};
    use graft_types::{ManualClock, Record};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store(storage: Arc<InMemoryStorage>, clock: Arc<ManualClock>) -> Graft {
        Graft::builder()
            .storage(storage)
            .clock(clock)
            .build()
            .await
            .unwrap()
    }

    fn stored(storage: &InMemoryStorage, key: &str) -> Record {
        Record::from_json(&storage.peek(key).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn first_write_creates_parent_edge() {
        let storage = Arc::new(InMemoryStorage::new());
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;

        write(&graft, "account/admin/username", Version::value(10, json!("admin"))).await;

        assert_eq!(
            stored(&storage, "account").versions("admin"),
            &[Version::reference(10, "account/admin")]
        );
        assert_eq!(
            stored(&storage, "account/admin").versions("username"),
            &[Version::value(10, json!("admin"))]
        );
    }

    #[tokio::test]
    async fn existing_edge_is_followed() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("users", r#"{"marco":[{"@":1,">":"account/admin"}]}"#);
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;

        write(&graft, "users/marco/fullname", Version::value(10, json!("Marco Polo"))).await;

        assert!(storage.peek("users/marco").is_none());
        assert_eq!(
            stored(&storage, "account/admin").versions("fullname"),
            &[Version::value(10, json!("Marco Polo"))]
        );
        assert_eq!(stored(&storage, "users").versions("marco").len(), 1);
    }

    #[tokio::test]
    async fn scalar_under_path_is_replaced_by_edge() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("a", r#"{"b":[{"@":1,"=":"flat"}]}"#);
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;

        write(&graft, "a/b/c", Version::value(10, json!(1))).await;

        let edge = stored(&storage, "a");
        assert_eq!(edge.versions("b").len(), 2);
        assert_eq!(edge.versions("b")[1], Version::reference(10, "a/b"));
    }

    #[tokio::test]
    async fn top_level_and_empty_writes_are_ignored() {
        let storage = Arc::new(InMemoryStorage::new());
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;
        write(&graft, "account", Version::value(10, json!(1))).await;
        write(&graft, "", Version::value(10, json!(1))).await;
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn repeated_version_is_not_rewritten() {
        let storage = Arc::new(InMemoryStorage::new());
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;
        write(&graft, "a/b", Version::value(5, json!(1))).await;
        write(&graft, "a/b", Version::value(5, json!(1))).await;
        assert_eq!(storage.put_count("a"), 1);
        write(&graft, "a/b", Version::value(6, json!(1))).await;
        assert_eq!(stored(&storage, "a").versions("b").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_writes_run_one_cycle_at_a_time() {
        let storage = Arc::new(InMemoryStorage::with_latency(Duration::from_millis(20)));
        let graft = store(storage.clone(), Arc::new(ManualClock::new(10))).await;

        tokio::join!(
            write(&graft, "a/x", Version::value(10, json!(1))),
            write(&graft, "a/y", Version::value(10, json!(2))),
        );

        // Neither write was lost.
        let record = stored(&storage, "a");
        assert!(record.contains("x"));
        assert!(record.contains("y"));

        // The second cycle's put only started after the first put finished.
        let puts: Vec<StorageOp> = storage
            .journal()
            .into_iter()
            .filter(|op| matches!(op, StorageOp::PutStarted(_) | StorageOp::PutFinished(_)))
            .collect();
        assert_eq!(
            puts,
            vec![
                StorageOp::PutStarted("a".into()),
                StorageOp::PutFinished("a".into()),
                StorageOp::PutStarted("a".into()),
                StorageOp::PutFinished("a".into()),
            ]
        );
    }
}
