use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::cache::store::CacheError;
use crate::helpers::time::WallClock;

/// Which layer served or stored an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Memory,
    Local,
    Remote,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Memory => "memory",
            Tier::Local => "local",
            Tier::Remote => "remote",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached response payload with its creation time (unix ms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub created_at_ms: i64,
}

impl CacheEntry {
    pub fn new(key: String, value: Vec<u8>, clock: &WallClock) -> Self {
        Self { key, value, created_at_ms: clock.now_unix_ms() }
    }

    /// An entry whose age reached the tier TTL is never served.
    pub fn is_expired(&self, ttl: Duration, clock: &WallClock) -> bool {
        clock.age_of(self.created_at_ms) >= ttl
    }

    pub fn encode(&self) -> Result<Vec<u8>, CacheError> {
        let stored = StoredEntry {
            key: self.key.clone(),
            created_at_ms: self.created_at_ms,
            value: STANDARD.encode(&self.value),
        };
        serde_json::to_vec(&stored).map_err(CacheError::from)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        let stored: StoredEntry = serde_json::from_slice(bytes)?;
        let value = STANDARD
            .decode(stored.value)
            .map_err(|e| CacheError::Encoding(format!("payload is not base64: {}", e)))?;
        Ok(Self { key: stored.key, value, created_at_ms: stored.created_at_ms })
    }
}

/// On-disk / on-wire form used by the persistent tiers.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    created_at_ms: i64,
    value: String,
}
