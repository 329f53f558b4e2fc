use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use graft_merge::decode_fields;
use graft_types::{Body, Envelope, Timestamp};

use crate::context::Context;
use crate::listeners::Listener;

/// Passes the first answer on, then goes quiet.
struct OnceListener {
    slot: Mutex<Option<oneshot::Sender<Envelope>>>,
}

impl Listener for OnceListener {
    fn notify(self: Arc<Self>, env: &Envelope) {
        if !matches!(env.body, Body::Scalar { .. } | Body::ObjectResponse { .. }) {
            return;
        }
        let sender = self.slot.lock().expect("once slot lock poisoned").take();
        if let Some(sender) = sender {
            // The query may have timed out and dropped its receiver.
            let _ = sender.send(env.clone());
        }
    }
}

/// The plain value an answer stands for.
fn answer(env: &Envelope, now: Timestamp) -> Option<Value> {
    match &env.body {
        Body::Scalar { value, .. } => Some(value.clone()),
        Body::ObjectResponse { fields, .. } => Some(Value::Object(decode_fields(fields, now))),
        _ => None,
    }
}

impl Context {
    /// Read the current value here once.
    ///
    /// Objects come back as a JSON object of their current fields, with
    /// references rendered as `{"#": path}`. Returns `None` if nothing
    /// answers within the context's `once` timeout; an answer arriving
    /// later is ignored.
    pub async fn once(&self) -> Option<Value> {
        let graft = self.graft();
        let path = self.key();
        let id = Uuid::now_v7();
        let (sender, receiver) = oneshot::channel();
        let listener = Arc::new(OnceListener {
            slot: Mutex::new(Some(sender)),
        });
        graft.subscriptions().add(&path, id, listener);
        graft.request_later(path.clone());

        let timeout = self.options().once_timeout;
        let outcome = tokio::time::timeout(timeout, receiver).await;
        graft.subscriptions().remove(&path, id);

        match outcome {
            Ok(Ok(env)) => answer(&env, graft.now()),
            Ok(Err(_)) => None,
            Err(_) => {
                debug!(path = %path, timeout_ms = timeout.as_millis() as u64, "once timed out");
                None
            }
        }
    }

    /// [`Context::once`] in the background; `callback` runs exactly once
    /// with the value and this context's last path segment.
    pub fn once_then<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<Value>, &str) + Send + 'static,
    {
        let ctx = self.clone();
        tokio::spawn(async move {
            let value = ctx.once().await;
            callback(value, ctx.name());
        })
    }
}
