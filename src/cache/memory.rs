use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;

use crate::cache::entry::CacheEntry;
use crate::helpers::time::WallClock;

/// Bounded in-process tier with least-recently-used eviction.
pub struct MemoryTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryTier {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), ttl }
    }

    /// Fresh entry for `key`; an expired one is dropped on the way.
    pub fn get(&self, key: &str, clock: &WallClock) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl, clock) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn put(&self, entry: CacheEntry) {
        self.entries.lock().put(entry.key.clone(), entry);
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
