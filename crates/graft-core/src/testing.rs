//! Test helpers shared by the crate's unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use graft_types::{Body, Envelope};

use crate::graft::Graft;
use crate::listeners::Listener;

/// Records every envelope delivered to one path.
#[derive(Default)]
pub(crate) struct Capture {
    seen: Mutex<Vec<Envelope>>,
}

impl Capture {
    pub fn on(graft: &Graft, path: &str) -> Arc<Self> {
        let capture = Arc::new(Self::default());
        graft.subscriptions().add(path, Uuid::now_v7(), capture.clone());
        capture
    }

    pub fn bodies(&self) -> Vec<Body> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|env| env.body.clone())
            .collect()
    }
}

impl Listener for Capture {
    fn notify(self: Arc<Self>, env: &Envelope) {
        self.seen.lock().unwrap().push(env.clone());
    }
}

/// Next value from a callback channel, or `None` if nothing arrives soon.
pub(crate) async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
