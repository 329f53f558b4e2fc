//! Hooks on the `create` and `opt` stages.

use async_trait::async_trait;
use tracing::{info, warn};

use graft_bus::{Flow, Hook, Stage};

use crate::graft::Graft;
use crate::signal::Signal;

/// Applies options once the store exists.
pub struct BootHook;

#[async_trait]
impl Hook<Graft, Signal> for BootHook {
    fn name(&self) -> &str {
        "boot"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        graft.dispatch(Stage::Opt, Signal::Boot).await;
        Flow::Continue(signal)
    }
}

/// Connects configured peer URLs and binds the configured listener through
/// the transport factory.
pub struct ConnectHook;

#[async_trait]
impl Hook<Graft, Signal> for ConnectHook {
    fn name(&self) -> &str {
        "connect"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let config = graft.config();
        if config.peers.is_empty() && config.listen.is_none() {
            return Flow::Continue(signal);
        }
        let Some(transport) = graft.transport() else {
            warn!(
                peers = config.peers.len(),
                listen = ?config.listen,
                "no transport factory; peer URLs and listen target ignored"
            );
            return Flow::Continue(signal);
        };

        if let Some(addr) = &config.listen {
            match transport.listen(addr, graft.inbox()).await {
                Ok(()) => info!(%addr, "listening for peers"),
                Err(err) => warn!(%addr, error = %err, "listen failed"),
            }
        }
        for url in &config.peers {
            match transport.connect(url).await {
                Ok(peer) => {
                    info!(%url, "peer connected");
                    graft.add_peer(peer);
                }
                Err(err) => warn!(%url, error = %err, "peer connect failed"),
            }
        }
        Flow::Continue(signal)
    }
}
