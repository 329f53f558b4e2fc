use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use graft_merge::{merge_values, resolved_value, select_current};
use graft_types::{Body, Envelope, Record, Timestamp};

use crate::context::Context;
use crate::graft::WeakGraft;
use crate::listeners::{Listener, SubscriptionId};

type Callback = dyn Fn(Value, &str) + Send + Sync;

#[derive(Default)]
struct OnState {
    /// Accumulated object delivered so far.
    object: Value,
    /// Last accepted timestamp per field; equal or older versions are ignored.
    seen: HashMap<String, Timestamp>,
    /// Last accepted timestamp of a scalar answer.
    scalar_seen: Option<Timestamp>,
    /// Serialized form of the last delivered value.
    previous: Option<String>,
    /// Paths this subscription listens on.
    known_paths: HashSet<String>,
}

/// One live query, possibly listening on several paths after redirects.
struct OnListener {
    id: SubscriptionId,
    graft: WeakGraft,
    key: String,
    state: Mutex<OnState>,
    callback: Arc<Callback>,
}

impl OnListener {
    /// Also listen on `target`, once per subscription.
    fn follow(self: Arc<Self>, target: &str) {
        let fresh = self
            .state
            .lock()
            .expect("on state lock poisoned")
            .known_paths
            .insert(target.to_owned());
        if !fresh {
            return;
        }
        let Some(graft) = self.graft.upgrade() else {
            return;
        };
        debug!(subscription = %self.id, target, "following redirect");
        graft.subscriptions().add(target, self.id, self.clone());
        graft.request_later(target.to_owned());
    }

    /// Fold newer field versions into the object. Returns the object to
    /// deliver, or `None` if nothing visible changed.
    fn absorb_fields(&self, fields: &Record, now: Timestamp) -> Option<Value> {
        let mut state = self.state.lock().expect("on state lock poisoned");
        if !state.object.is_object() {
            state.object = Value::Object(Map::new());
        }
        let mut update = Map::new();
        for (field, versions) in fields.fields() {
            let Some(current) = select_current(versions, now) else {
                continue;
            };
            if state.seen.get(field).is_some_and(|seen| current.timestamp <= *seen) {
                trace!(field, timestamp = current.timestamp, "stale or repeated field version ignored");
                continue;
            }
            state.seen.insert(field.to_owned(), current.timestamp);
            update.insert(field.to_owned(), resolved_value(current));
        }
        merge_values(&mut state.object, Value::Object(update));
        let object = state.object.clone();
        state.changed(&object).then_some(object)
    }

    fn absorb_scalar(&self, timestamp: Timestamp, value: &Value) -> Option<Value> {
        let mut state = self.state.lock().expect("on state lock poisoned");
        if state.scalar_seen.is_some_and(|seen| timestamp <= seen) {
            trace!(timestamp, "stale or repeated scalar ignored");
            return None;
        }
        state.scalar_seen = Some(timestamp);
        state.object = Value::Null;
        state.seen.clear();
        state.changed(value).then(|| value.clone())
    }
}

impl OnState {
    fn changed(&mut self, value: &Value) -> bool {
        let snapshot = value.to_string();
        if self.previous.as_deref() == Some(snapshot.as_str()) {
            return false;
        }
        self.previous = Some(snapshot);
        true
    }
}

impl Listener for OnListener {
    fn notify(self: Arc<Self>, env: &Envelope) {
        let delivery = match &env.body {
            Body::Redirect { target, .. } | Body::Reference { target, .. } => {
                Arc::clone(&self).follow(target);
                None
            }
            Body::Scalar { timestamp, value, .. } => self.absorb_scalar(*timestamp, value),
            Body::ObjectResponse { fields, .. } => {
                let Some(graft) = self.graft.upgrade() else {
                    return;
                };
                self.absorb_fields(fields, graft.now())
            }
            Body::RequestOnly { .. } | Body::StorageReply { .. } => None,
        };
        if let Some(value) = delivery {
            (self.callback)(value, &self.key);
        }
    }
}

impl Context {
    /// Subscribe to every change of the value here.
    ///
    /// `callback` receives the value and this context's last path segment.
    /// It runs first with the current value, if any, then on each update
    /// that changes what was last delivered; older field versions are
    /// ignored. Redirects to another path are followed transparently.
    /// The subscription lives as long as the store.
    pub fn on<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Value, &str) + Send + Sync + 'static,
    {
        let graft = self.graft();
        let path = self.key();
        let id = Uuid::now_v7();
        let listener = Arc::new(OnListener {
            id,
            graft: graft.downgrade(),
            key: self.name().to_owned(),
            state: Mutex::new(OnState {
                known_paths: HashSet::from([path.clone()]),
                ..OnState::default()
            }),
            callback: Arc::new(callback),
        });
        graft.subscriptions().add(&path, id, listener);
        graft.request_later(path);
        id
    }
}
