//! Response caching.
//!
//! Three layers probed in order of latency: an in-process LRU, a local file
//! store and a shared remote store. Each layer has its own TTL; only the
//! memory layer is capacity-bound.

pub mod entry;
pub mod file_store;
pub mod http_store;
pub mod key;
pub mod memory;
pub mod store;
pub mod tiered;

pub use entry::{CacheEntry, Tier};
pub use file_store::FileStore;
pub use http_store::HttpStore;
pub use key::CacheKey;
pub use memory::MemoryTier;
pub use store::{CacheError, CacheStore, MemoryStore};
pub use tiered::{CacheHit, StoreTier, TieredCache, WriteReport};
