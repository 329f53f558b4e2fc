use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, trace};

use crate::context::{Context, WeakContext};

type Filter = dyn Fn(Value) -> Option<Value> + Send + Sync;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    On,
    Once,
}

/// Fan-out of the object at a context into one subscription per key.
///
/// Built by [`Context::map`]. Each update from the source query is passed
/// through the filter; every key of the result not seen before by this
/// query gets its own child subscription. Keys are never forgotten.
pub struct MapQuery {
    ctx: Context,
    source: Source,
    filter: Arc<Filter>,
}

/// Tracks which child keys a map query has opened.
struct Discovery {
    parent: WeakContext,
    filter: Arc<Filter>,
    known: Mutex<HashSet<String>>,
}

impl Discovery {
    /// Child contexts for keys of `value` seen for the first time.
    fn discover(&self, value: Value) -> Vec<Context> {
        let Some(parent) = self.parent.upgrade() else {
            return Vec::new();
        };
        let Some(Value::Object(fields)) = (self.filter)(value) else {
            trace!(path = %parent.key(), "filtered update has no keys");
            return Vec::new();
        };
        let mut known = self.known.lock().expect("map key lock poisoned");
        fields
            .into_iter()
            .filter_map(|(key, _)| known.insert(key.clone()).then(|| parent.child(key)))
            .collect()
    }
}

impl Context {
    /// Fan out over the keys of the object here. Defaults to a live source
    /// and no filtering.
    pub fn map(&self) -> MapQuery {
        MapQuery {
            ctx: self.clone(),
            source: Source::On,
            filter: Arc::new(Some::<Value>),
        }
    }
}

impl MapQuery {
    /// Transform each source update before keys are taken from it. Returning
    /// `None` skips the update.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Read the parent object once instead of subscribing to it.
    pub fn from_once(mut self) -> Self {
        self.source = Source::Once;
        self
    }

    /// Subscribe to every discovered child with [`Context::on`].
    pub fn on<F>(self, receiver: F)
    where
        F: Fn(Value, &str) + Send + Sync + 'static,
    {
        let receiver = Arc::new(receiver);
        self.run(move |child| {
            let receiver = Arc::clone(&receiver);
            child.on(move |value, key| receiver(value, key));
        });
    }

    /// Read every discovered child once with [`Context::once`].
    pub fn once<F>(self, receiver: F)
    where
        F: Fn(Option<Value>, &str) + Send + Sync + 'static,
    {
        let receiver = Arc::new(receiver);
        self.run(move |child| {
            let receiver = Arc::clone(&receiver);
            child.once_then(move |value, key| receiver(value, key));
        });
    }

    fn run<S>(self, open: S)
    where
        S: Fn(Context) + Send + Sync + 'static,
    {
        let discovery = Discovery {
            parent: self.ctx.downgrade(),
            filter: self.filter,
            known: Mutex::default(),
        };
        let fan_out = move |value: Value| {
            for child in discovery.discover(value) {
                debug!(path = %child.key(), "map opened child");
                open(child);
            }
        };
        match self.source {
            Source::On => {
                self.ctx.on(move |value, _| fan_out(value));
            }
            Source::Once => {
                self.ctx.once_then(move |value, _| {
                    if let Some(value) = value {
                        fan_out(value);
                    }
                });
            }
        }
    }
}

impl std::fmt::Debug for MapQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapQuery")
            .field("path", &self.ctx.key())
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::graft::Graft;
    use crate::testing::next;
    use graft_store::InMemoryStorage;
    use graft_types::ManualClock;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    async fn users() -> (Graft, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let graft = Graft::builder()
            .storage(Arc::new(InMemoryStorage::new()))
            .clock(clock.clone())
            .build()
            .await
            .unwrap();
        graft.get("account/admin").put(json!({"username": "admin"})).await.unwrap();
        graft.get("users/marco").put(&graft.get("account/admin")).await.unwrap();
        graft.get("users/polo").put(json!({"username": "polo"})).await.unwrap();
        (graft, clock)
    }

    async fn drain<T: Ord>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = next(rx).await {
            out.push(item);
        }
        out.sort();
        out
    }

    #[tokio::test(start_paused = true)]
    async fn opens_a_live_child_per_key() {
        let (graft, clock) = users().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        graft.get("users").map().on(move |value, key| {
            let _ = tx.send((key.to_owned(), value.to_string()));
        });

        assert_eq!(
            drain(&mut rx).await,
            vec![
                ("marco".to_owned(), json!({"username": "admin"}).to_string()),
                ("polo".to_owned(), json!({"username": "polo"}).to_string()),
            ]
        );

        clock.advance(10);
        graft.get("users/nico").put(json!({"username": "nico"})).await.unwrap();
        assert_eq!(
            drain(&mut rx).await,
            vec![("nico".to_owned(), json!({"username": "nico"}).to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn filter_limits_keys() {
        let (graft, _) = users().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        graft
            .get("users")
            .map()
            .filter(|value| {
                let mut value = value;
                value.as_object_mut()?.remove("polo");
                Some(value)
            })
            .on(move |_, key| {
                let _ = tx.send(key.to_owned());
            });
        assert_eq!(drain(&mut rx).await, vec!["marco".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn once_source_with_once_children() {
        let (graft, _) = users().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        graft.get("users").map().from_once().once(move |value: Option<Value>, key| {
            let _ = tx.send((key.to_owned(), value.map(|v| v.to_string())));
        });
        assert_eq!(
            drain(&mut rx).await,
            vec![
                ("marco".to_owned(), Some(json!({"username": "admin"}).to_string())),
                ("polo".to_owned(), Some(json!({"username": "polo"}).to_string())),
            ]
        );
    }
}
