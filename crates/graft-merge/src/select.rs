use graft_types::{Timestamp, Version};

/// Pick the current version of a field.
///
/// Versions stamped after `now` are pending and skipped. Among the rest the
/// highest timestamp wins; on equal timestamps the later entry in `versions`
/// wins, so the result is deterministic for a fixed history order.
pub fn select_current(versions: &[Version], now: Timestamp) -> Option<&Version> {
    versions
        .iter()
        .filter(|v| !v.is_pending(now))
        .fold(None, |best: Option<&Version>, v| match best {
            Some(b) if b.timestamp > v.timestamp => Some(b),
            _ => Some(v),
        })
}
