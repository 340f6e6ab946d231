use lru::LruCache;
use std::num::NonZeroUsize;

/// Block hashes a policy has already processed, least recently seen evicted
/// first once `capacity` is reached (0 = unbounded).
///
/// A re-delivery refreshes the hash, so blocks that keep circulating stay
/// deduplicated. Evicting a hash never leads to a second relay: a re-delivered
/// evicted block is refused by the chain state, and policies only relay blocks
/// the chain state newly attached.
#[derive(Debug)]
pub struct SeenSet {
    hashes: LruCache<String, ()>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        let hashes = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self { hashes }
    }

    /// Mark `hash` as seen. Returns `true` on first sighting.
    pub fn insert(&mut self, hash: &str) -> bool {
        if self.hashes.contains(hash) {
            self.hashes.promote(hash);
            return false;
        }
        self.hashes.put(hash.to_string(), ());
        true
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
