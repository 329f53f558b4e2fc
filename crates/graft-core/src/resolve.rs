//! Answering `<` requests from storage.
//!
//! Resolution walks the requested path one segment at a time, starting at
//! the top-level record:
//!
//! - a reference field is followed: its target becomes the record to read
//!   next, like a symlink;
//! - a field with no current version is folded into the record key
//!   (`a` + `b` becomes the record `a/b`), reaching records stored without
//!   an edge;
//! - a scalar at the last segment is republished under the requested path;
//! - when no segment is left, the record itself is answered as an object
//!   response, followed by a redirect if it lives under another path.
//!
//! A missing record ends resolution without an answer. Following is bounded
//! by `max_ref_hops` and by refusing to revisit a target, so reference
//! cycles terminate.

use std::collections::{HashSet, VecDeque};

use tracing::{trace, warn};

use graft_merge::{materialize, select_current};
use graft_types::{Body, Envelope, Payload};

use crate::graft::Graft;

pub(crate) async fn resolve(graft: &Graft, requested: &str) {
    let separator = graft.separator();
    let mut rest: VecDeque<&str> = requested.split(separator).filter(|s| !s.is_empty()).collect();
    let Some(top) = rest.pop_front() else {
        return;
    };
    let mut key = top.to_owned();
    let mut visited = HashSet::new();
    let max_hops = graft.config().max_ref_hops;

    loop {
        let Some(record) = graft.fetch(&key).await else {
            trace!(requested, key = %key, "nothing stored");
            return;
        };
        let now = graft.now();

        let Some(field) = rest.pop_front() else {
            let fields = materialize(&record, now);
            graft
                .respond(Envelope::new(Body::ObjectResponse {
                    path: requested.to_owned(),
                    fields,
                }))
                .await;
            if key != requested {
                graft
                    .respond(Envelope::new(Body::Redirect {
                        path: requested.to_owned(),
                        target: key,
                    }))
                    .await;
            }
            return;
        };

        match select_current(record.versions(field), now).map(|v| (v.timestamp, &v.payload)) {
            Some((_, Payload::Ref(target))) => {
                if visited.len() >= max_hops || !visited.insert(target.clone()) {
                    warn!(requested, target = %target, hops = visited.len(), "reference follow stopped");
                    return;
                }
                key = target.clone();
            }
            Some((timestamp, Payload::Value(value))) if rest.is_empty() => {
                graft
                    .respond(Envelope::scalar(requested, timestamp, value.clone()))
                    .await;
                return;
            }
            Some(_) => {
                trace!(requested, key = %key, field, "scalar in the middle of the path");
                return;
            }
            None => key = format!("{key}{separator}{field}"),
        }
    }
}
