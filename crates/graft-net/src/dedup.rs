use std::collections::{HashSet, VecDeque};

/// BLAKE3 digest of an encoded envelope.
pub type Digest = [u8; 32];

/// Bounded recent-history of envelope digests.
///
/// Remembers the last `capacity` distinct digests; the oldest is forgotten
/// when a new one arrives at capacity. This gives an approximate
/// "seen recently" answer, not exactly-once delivery: a duplicate arriving
/// after its digest was evicted is treated as new.
#[derive(Debug)]
pub struct DedupRing {
    capacity: usize,
    order: VecDeque<Digest>,
    seen: HashSet<Digest>,
}

impl DedupRing {
    /// Default window, matching the store configuration default.
    pub const DEFAULT_CAPACITY: usize = 8192;

    /// A ring remembering at most `capacity` digests (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Digest of an encoded envelope.
    pub fn digest(text: &str) -> Digest {
        *blake3::hash(text.as_bytes()).as_bytes()
    }

    /// Short hex form of a digest for logs.
    pub fn short(digest: &Digest) -> String {
        hex::encode(&digest[..6])
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.seen.contains(digest)
    }

    /// Remember `digest`. Returns `false` if it was already remembered.
    pub fn record(&mut self, digest: Digest) -> bool {
        if self.seen.contains(&digest) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(digest);
        self.seen.insert(digest);
        true
    }

    /// Remember the digest of `text`. Returns `true` if it was seen before.
    pub fn check_and_record(&mut self, text: &str) -> bool {
        !self.record(Self::digest(text))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DedupRing {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_is_duplicate() {
        let mut ring = DedupRing::new(4);
        assert!(!ring.check_and_record(r#"{"<":"a"}"#));
        assert!(ring.check_and_record(r#"{"<":"a"}"#));
        assert!(!ring.check_and_record(r#"{"<":"b"}"#));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn oldest_is_evicted_at_capacity() {
        let mut ring = DedupRing::new(2);
        ring.check_and_record("one");
        ring.check_and_record("two");
        ring.check_and_record("three");
        assert_eq!(ring.len(), 2);
        assert!(!ring.contains(&DedupRing::digest("one")));
        // Evicted, so it counts as new again.
        assert!(!ring.check_and_record("one"));
        assert!(ring.contains(&DedupRing::digest("three")));
    }

    #[test]
    fn duplicates_do_not_refresh_position() {
        let mut ring = DedupRing::new(2);
        ring.check_and_record("a");
        ring.check_and_record("b");
        assert!(ring.check_and_record("a"));
        ring.check_and_record("c");
        assert!(!ring.contains(&DedupRing::digest("a")));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ring = DedupRing::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.check_and_record("x");
        assert!(ring.check_and_record("x"));
    }

    #[test]
    fn short_digest_is_hex() {
        let short = DedupRing::short(&DedupRing::digest("x"));
        assert_eq!(short.len(), 12);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
