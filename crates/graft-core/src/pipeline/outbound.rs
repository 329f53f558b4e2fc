//! Hooks on the `out` stage.

use async_trait::async_trait;
use tracing::{trace, warn};

use graft_bus::{Flow, Hook};

use crate::graft::Graft;
use crate::signal::{Outbound, Signal};

/// Renders envelopes as JSON text and remembers them, so the copy a peer
/// floods back is recognized as a duplicate.
pub struct EncodeHook;

#[async_trait]
impl Hook<Graft, Signal> for EncodeHook {
    fn name(&self) -> &str {
        "encode"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        match signal {
            Signal::Outbound(Outbound::Envelope(env)) => {
                let text = env.to_text();
                graft.seen_before(&text);
                Flow::Continue(Signal::Outbound(Outbound::Text(text)))
            }
            other => Flow::Continue(other),
        }
    }
}

/// Sends encoded envelopes to every peer.
pub struct FanOutHook;

#[async_trait]
impl Hook<Graft, Signal> for FanOutHook {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        if let Signal::Outbound(Outbound::Text(text)) = &signal {
            let peers = graft.peers();
            for peer in &peers {
                if let Err(err) = peer.send(text).await {
                    warn!(peer = peer.id(), error = %err, "send to peer failed");
                }
            }
            trace!(peers = peers.len(), bytes = text.len(), "envelope fanned out");
        }
        Flow::Continue(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_bus::{Dispatch, Stage};
    use graft_net::{NetResult, Peer};
    use graft_types::Envelope;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl Peer for Recorder {
        fn id(&self) -> &str {
            "recorder"
        }
        async fn send(&self, text: &str) -> NetResult<()> {
            self.0.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn out_stage_encodes_and_reaches_every_peer() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let graft = Graft::builder().peer(a.clone() as Arc<dyn Peer>).build().await.unwrap();
        graft.add_peer(b.clone());

        let env = Envelope::request("account/admin");
        let outcome = graft
            .dispatch(Stage::Out, Signal::Outbound(Outbound::Envelope(env.clone())))
            .await;
        assert_eq!(outcome, Dispatch::Completed(Signal::Outbound(Outbound::Text(env.to_text()))));
        assert_eq!(*a.0.lock().unwrap(), vec![env.to_text()]);
        assert_eq!(*b.0.lock().unwrap(), vec![env.to_text()]);
    }

    #[tokio::test]
    async fn encoded_envelopes_count_as_seen() {
        let graft = Graft::new().await.unwrap();
        let env = Envelope::request("x");
        graft
            .dispatch(Stage::Out, Signal::Outbound(Outbound::Envelope(env.clone())))
            .await;
        assert!(graft.seen_before(&env.to_text()));
    }
}
