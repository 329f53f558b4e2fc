//! Hooks on the `in` stage, in run order.

use async_trait::async_trait;
use tracing::{debug, trace};

use graft_bus::{Flow, Hook, Stage};
use graft_types::{Body, Envelope, Timestamp, Version};

use crate::graft::Graft;
use crate::resolve::resolve;
use crate::signal::{Inbound, Origin, Outbound, Signal};
use crate::writer::write;

fn body(signal: &Signal) -> Option<&Body> {
    signal.inbound_envelope().map(|env| &env.body)
}

/// Turns text, bytes and JSON payloads into envelopes. Payloads that do not
/// decode travel on unchanged.
pub struct DecodeHook;

#[async_trait]
impl Hook<Graft, Signal> for DecodeHook {
    fn name(&self) -> &str {
        "decode"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let (payload, origin) = match signal {
            Signal::Inbound { payload, origin } => (payload, origin),
            other => return Flow::Continue(other),
        };
        let separator = graft.separator();
        let decoded = match &payload {
            Inbound::Text(text) => Envelope::from_text(text, separator),
            Inbound::Bytes(bytes) => Envelope::from_bytes(bytes, separator),
            Inbound::Json(value) => Envelope::from_value(value, separator),
            Inbound::Envelope(_) => return Flow::Continue(Signal::Inbound { payload, origin }),
        };
        let payload = match decoded {
            Ok(env) => Inbound::Envelope(env),
            Err(err) => {
                debug!(?origin, error = %err, "undecodable payload passed through");
                payload
            }
        };
        Flow::Continue(Signal::Inbound { payload, origin })
    }
}

/// Stamps the transmit time on envelopes that arrive without one.
pub struct StampHook;

#[async_trait]
impl Hook<Graft, Signal> for StampHook {
    fn name(&self) -> &str {
        "stamp"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        match signal {
            Signal::Inbound {
                mut payload,
                origin,
            } => {
                if let Some(env) = payload.envelope_mut() {
                    env.transmitted.get_or_insert_with(|| graft.now());
                }
                Flow::Continue(Signal::Inbound { payload, origin })
            }
            other => Flow::Continue(other),
        }
    }
}

/// Remembers every envelope and drops remote envelopes seen recently.
///
/// Local envelopes are never dropped: two identical local requests issued in
/// the same millisecond are both meant.
pub struct DedupHook;

#[async_trait]
impl Hook<Graft, Signal> for DedupHook {
    fn name(&self) -> &str {
        "dedup"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let probe = match &signal {
            Signal::Inbound {
                payload: Inbound::Envelope(env),
                origin,
            } if !env.is_storage_reply() => Some((env.to_text(), *origin)),
            _ => None,
        };
        let Some((text, origin)) = probe else {
            return Flow::Continue(signal);
        };
        if graft.seen_before(&text) && origin == Origin::Remote {
            debug!(bytes = text.len(), "duplicate remote envelope dropped");
            return Flow::Halt;
        }
        Flow::Continue(signal)
    }
}

/// Floods every envelope except storage replies to the `out` stage.
pub struct RetransmitHook;

#[async_trait]
impl Hook<Graft, Signal> for RetransmitHook {
    fn name(&self) -> &str {
        "retransmit"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let outgoing = signal
            .inbound_envelope()
            .filter(|env| !env.is_storage_reply())
            .cloned();
        if let Some(env) = outgoing {
            graft
                .dispatch(Stage::Out, Signal::Outbound(Outbound::Envelope(env)))
                .await;
        }
        Flow::Continue(signal)
    }
}

/// Resumes storage readers waiting on a reply's correlation key. Storage
/// replies stop here.
pub struct RepliesHook;

#[async_trait]
impl Hook<Graft, Signal> for RepliesHook {
    fn name(&self) -> &str {
        "replies"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let reply = match body(&signal) {
            Some(Body::StorageReply { key, record }) => Some((key.clone(), record.clone())),
            _ => None,
        };
        match reply {
            Some((key, record)) => {
                if graft.registry().drain(&key, record) == 0 {
                    trace!(key = %key, "storage reply with no waiters dropped");
                }
                Flow::Halt
            }
            None => Flow::Continue(signal),
        }
    }
}

/// Hands envelopes to the queries listening on their subject path.
///
/// Writes stamped later than the store's clock are pending: they are stored
/// but not shown to queries until they are due.
pub struct NotifyHook;

#[async_trait]
impl Hook<Graft, Signal> for NotifyHook {
    fn name(&self) -> &str {
        "notify"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        if let Some(env) = signal.inbound_envelope() {
            if let Some(subject) = env.subject() {
                match written_at(env) {
                    Some(timestamp) if timestamp > graft.now() => {
                        trace!(subject, timestamp, "pending write withheld from queries");
                    }
                    _ => {
                        graft.subscriptions().notify(subject, env);
                    }
                }
            }
        }
        Flow::Continue(signal)
    }
}

fn written_at(env: &Envelope) -> Option<Timestamp> {
    match env.body {
        Body::Scalar { timestamp, .. } | Body::Reference { timestamp, .. } => Some(timestamp),
        _ => None,
    }
}

/// Answers `<` requests from storage.
pub struct ResolveHook;

#[async_trait]
impl Hook<Graft, Signal> for ResolveHook {
    fn name(&self) -> &str {
        "resolve"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let requested = match body(&signal) {
            Some(Body::RequestOnly { path }) => Some(path.clone()),
            _ => None,
        };
        if let Some(path) = requested {
            resolve(graft, &path).await;
        }
        Flow::Continue(signal)
    }
}

/// Merges scalar and reference writes into storage.
pub struct WriteHook;

#[async_trait]
impl Hook<Graft, Signal> for WriteHook {
    fn name(&self) -> &str {
        "write"
    }

    async fn call(&self, graft: &Graft, signal: Signal) -> Flow<Signal> {
        let incoming = match body(&signal) {
            Some(Body::Scalar {
                path,
                timestamp,
                value,
            }) => Some((path.clone(), Version::value(*timestamp, value.clone()))),
            Some(Body::Reference {
                path,
                timestamp,
                target,
            }) => Some((path.clone(), Version::reference(*timestamp, target.clone()))),
            _ => None,
        };
        if let Some((path, version)) = incoming {
            write(graft, &path, version).await;
        }
        Flow::Continue(signal)
    }
}
