use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::NetResult;
use crate::peer::Peer;

/// A connection that can come and go.
#[async_trait]
pub trait Link: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Deliver one encoded envelope now.
    async fn transmit(&self, text: &str) -> NetResult<()>;
}

/// A peer that never drops a send.
///
/// While the link is down, sends are queued. The queue is flushed in
/// submission order by the next send on a live link or by [`flush`].
///
/// [`flush`]: BufferedPeer::flush
pub struct BufferedPeer<L> {
    id: String,
    link: L,
    pending: Mutex<VecDeque<String>>,
}

impl<L: Link> BufferedPeer<L> {
    pub fn new(id: impl Into<String>, link: L) -> Self {
        Self {
            id: id.into(),
            link,
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Number of queued sends.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Deliver queued sends, oldest first. Returns how many went out.
    pub async fn flush(&self) -> NetResult<usize> {
        let mut queue = self.pending.lock().await;
        Ok(self.drain(&mut queue).await)
    }

    async fn drain(&self, queue: &mut VecDeque<String>) -> usize {
        let mut sent = 0;
        while self.link.is_connected() {
            let Some(text) = queue.pop_front() else {
                break;
            };
            if let Err(err) = self.link.transmit(&text).await {
                warn!(peer = %self.id, error = %err, "transmit failed; keeping message queued");
                queue.push_front(text);
                break;
            }
            sent += 1;
        }
        if sent > 0 {
            debug!(peer = %self.id, sent, remaining = queue.len(), "flushed queued sends");
        }
        sent
    }
}

#[async_trait]
impl<L: Link> Peer for BufferedPeer<L> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, text: &str) -> NetResult<()> {
        let mut queue = self.pending.lock().await;
        queue.push_back(text.to_owned());
        if !self.link.is_connected() {
            debug!(peer = %self.id, queued = queue.len(), "link down; send queued");
            return Ok(());
        }
        self.drain(&mut queue).await;
        Ok(())
    }
}

impl<L> std::fmt::Debug for BufferedPeer<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedPeer").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        up: AtomicBool,
        broken: AtomicBool,
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Link for Recorder {
        fn is_connected(&self) -> bool {
            self.up.load(Ordering::SeqCst)
        }
        async fn transmit(&self, text: &str) -> NetResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(NetError::Transport("broken pipe".into()));
            }
            self.sent.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    fn sent(peer: &BufferedPeer<Recorder>) -> Vec<String> {
        peer.link().sent.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn connected_sends_go_straight_out() {
        let peer = BufferedPeer::new("p", Recorder::default());
        peer.link().up.store(true, Ordering::SeqCst);
        peer.send("a").await.unwrap();
        assert_eq!(sent(&peer), vec!["a"]);
        assert_eq!(peer.pending().await, 0);
    }

    #[tokio::test]
    async fn sends_queue_while_down_and_flush_in_order() {
        let peer = BufferedPeer::new("p", Recorder::default());
        peer.send("1").await.unwrap();
        peer.send("2").await.unwrap();
        assert!(sent(&peer).is_empty());
        assert_eq!(peer.pending().await, 2);

        peer.link().up.store(true, Ordering::SeqCst);
        assert_eq!(peer.flush().await.unwrap(), 2);
        peer.send("3").await.unwrap();
        assert_eq!(sent(&peer), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn backlog_goes_before_new_send() {
        let peer = BufferedPeer::new("p", Recorder::default());
        peer.send("old").await.unwrap();
        peer.link().up.store(true, Ordering::SeqCst);
        peer.send("new").await.unwrap();
        assert_eq!(sent(&peer), vec!["old", "new"]);
    }

    #[tokio::test]
    async fn failed_transmit_keeps_message() {
        let peer = BufferedPeer::new("p", Recorder::default());
        peer.link().up.store(true, Ordering::SeqCst);
        peer.link().broken.store(true, Ordering::SeqCst);
        peer.send("x").await.unwrap();
        assert_eq!(peer.pending().await, 1);
        peer.link().broken.store(false, Ordering::SeqCst);
        assert_eq!(peer.flush().await.unwrap(), 1);
        assert_eq!(sent(&peer), vec!["x"]);
    }
}
