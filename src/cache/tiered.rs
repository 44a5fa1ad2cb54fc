use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::entry::{CacheEntry, Tier};
use crate::cache::memory::MemoryTier;
use crate::cache::store::{CacheError, CacheStore};
use crate::helpers::time::WallClock;

const SHARDS: usize = 64;

/// A persistent tier: a store plus its own TTL.
#[derive(Clone)]
pub struct StoreTier {
    pub store: Arc<dyn CacheStore>,
    pub ttl: Duration,
}

impl StoreTier {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

/// A lookup result together with the tier that answered it.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub tier: Tier,
}

/// Outcome of a write that succeeded on the mandatory tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// remote tier could not be written; the entry is still in memory/local
    pub remote_failed: bool,
}

/// Memory → local → remote cache with promotion on read.
///
/// Memory and local writes are mandatory, the remote tier is best-effort.
/// An unreachable remote reads as a miss.
///
/// `put` and `invalidate` advance a per-key-shard version when they start
/// and again when they finish. A read snapshots the version before probing
/// the slower tiers and only promotes if it is unchanged, so a write or
/// invalidation overlapping the probe is never undone.
pub struct TieredCache {
    memory: MemoryTier,
    local: Option<StoreTier>,
    remote: Option<StoreTier>,
    clock: WallClock,
    shards: Mutex<Vec<Shard>>,
}

impl TieredCache {
    pub fn new(memory: MemoryTier, local: Option<StoreTier>, remote: Option<StoreTier>) -> Self {
        Self {
            memory,
            local,
            remote,
            clock: WallClock::new(),
            shards: Mutex::new(vec![Shard::default(); SHARDS]),
        }
    }

    pub fn memory_only(capacity: usize, ttl: Duration) -> Self {
        Self::new(MemoryTier::new(capacity, ttl), None, None)
    }

    pub fn clock(&self) -> &WallClock {
        &self.clock
    }

    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    /// First fresh hit in tier order; slower-tier hits are copied into every
    /// faster tier unless the key was written or invalidated meanwhile.
    pub async fn get(&self, key: &str) -> Option<CacheHit> {
        let seen = self.snapshot(key);
        if let Some(entry) = self.memory.get(key, &self.clock) {
            debug!(key, tier = %Tier::Memory, "cache hit");
            return Some(CacheHit { entry, tier: Tier::Memory });
        }

        if let Some(local) = &self.local {
            if let Some(entry) = self.probe(local, Tier::Local, key).await {
                if self.promote_to_memory(seen, &entry) {
                    debug!(key, tier = %Tier::Local, "cache hit, promoted");
                } else {
                    debug!(key, tier = %Tier::Local, "cache hit, key changed meanwhile, not promoted");
                }
                return Some(CacheHit { entry, tier: Tier::Local });
            }
        }

        if let Some(remote) = &self.remote {
            if let Some(entry) = self.probe(remote, Tier::Remote, key).await {
                if self.promote_to_memory(seen, &entry) {
                    if let Some(local) = &self.local {
                        self.promote_to_local(local, seen, &entry).await;
                    }
                    debug!(key, tier = %Tier::Remote, "cache hit, promoted");
                } else {
                    debug!(key, tier = %Tier::Remote, "cache hit, key changed meanwhile, not promoted");
                }
                return Some(CacheHit { entry, tier: Tier::Remote });
            }
        }

        debug!(key, "cache miss");
        None
    }

    /// Write-through. Fails only when the memory or local write fails; a
    /// remote failure is reported in the returned `WriteReport`.
    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<WriteReport, CacheError> {
        let entry = CacheEntry::new(key.to_owned(), value, &self.clock);
        let _write = self.begin_write(key, || self.memory.put(entry.clone()));

        if let Some(local) = &self.local {
            write_tier(local, &entry).await?;
        }

        let mut report = WriteReport::default();
        if let Some(remote) = &self.remote {
            if let Err(e) = write_tier(remote, &entry).await {
                warn!(key, error = %e, "remote cache write failed");
                report.remote_failed = true;
            }
        }
        Ok(report)
    }

    /// Removes `key` everywhere. Absent keys are fine; a remote failure is
    /// soft, as for `put`.
    pub async fn invalidate(&self, key: &str) -> Result<WriteReport, CacheError> {
        let _write = self.begin_write(key, || self.memory.remove(key));

        if let Some(local) = &self.local {
            local.store.delete(key).await?;
        }

        let mut report = WriteReport::default();
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.store.delete(key).await {
                warn!(key, error = %e, "remote cache invalidation failed");
                report.remote_failed = true;
            }
        }
        debug!(key, "cache invalidated");
        Ok(report)
    }

    /// Current version of the key's shard, `None` while a write is running.
    fn snapshot(&self, key: &str) -> Option<u64> {
        let shards = self.shards.lock();
        let shard = &shards[shard_of(key)];
        (shard.writers == 0).then_some(shard.version)
    }

    fn is_current(&self, key: &str, seen: u64) -> bool {
        self.shards.lock()[shard_of(key)].version == seen
    }

    /// Starts a write on the key's shard and applies the memory change under
    /// the same lock. The write ends when the guard drops.
    fn begin_write(&self, key: &str, apply: impl FnOnce()) -> WriteGuard<'_> {
        let index = shard_of(key);
        let mut shards = self.shards.lock();
        let shard = &mut shards[index];
        shard.version = shard.version.wrapping_add(1);
        shard.writers += 1;
        apply();
        WriteGuard { shards: &self.shards, index }
    }

    fn promote_to_memory(&self, seen: Option<u64>, entry: &CacheEntry) -> bool {
        let Some(seen) = seen else {
            return false;
        };
        let shards = self.shards.lock();
        if shards[shard_of(&entry.key)].version != seen {
            return false;
        }
        self.memory.put(entry.clone());
        true
    }

    /// The local write is async, so a write that starts during it is
    /// detected afterwards and the promoted copy is dropped again.
    async fn promote_to_local(&self, local: &StoreTier, seen: Option<u64>, entry: &CacheEntry) {
        let Some(seen) = seen else {
            return;
        };
        if let Err(e) = write_tier(local, entry).await {
            warn!(key = %entry.key, error = %e, "promotion into local tier failed");
            return;
        }
        if !self.is_current(&entry.key, seen) {
            debug!(key = %entry.key, "key changed during promotion, dropping local copy");
            if let Err(e) = local.store.delete(&entry.key).await {
                warn!(key = %entry.key, error = %e, "could not drop promoted local copy");
            }
        }
    }

    async fn probe(&self, tier: &StoreTier, name: Tier, key: &str) -> Option<CacheEntry> {
        let bytes = match tier.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, tier = %name, error = %e, "cache tier unavailable, treated as miss");
                return None;
            }
        };

        let entry = match CacheEntry::decode(&bytes) {
            Ok(entry) if entry.key == key => entry,
            Ok(_) => {
                warn!(key, tier = %name, "stored entry belongs to another key, ignored");
                return None;
            }
            Err(e) => {
                warn!(key, tier = %name, error = %e, "undecodable cache entry, ignored");
                return None;
            }
        };

        if entry.is_expired(tier.ttl, &self.clock) {
            debug!(key, tier = %name, "cache entry expired");
            // only the local tier is ours to clean up
            if name == Tier::Local {
                let _ = tier.store.delete(key).await;
            }
            return None;
        }
        Some(entry)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Shard {
    version: u64,
    writers: u32,
}

/// Ends a `put`/`invalidate`, on every return path.
struct WriteGuard<'a> {
    shards: &'a Mutex<Vec<Shard>>,
    index: usize,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut shards = self.shards.lock();
        let shard = &mut shards[self.index];
        shard.version = shard.version.wrapping_add(1);
        shard.writers -= 1;
    }
}

fn shard_of(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % SHARDS as u64) as usize
}

async fn write_tier(tier: &StoreTier, entry: &CacheEntry) -> Result<(), CacheError> {
    let bytes = entry.encode()?;
    tier.store.put(&entry.key, &bytes).await
}
