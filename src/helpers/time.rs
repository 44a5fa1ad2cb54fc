use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

/// Wall clock anchored to the tokio monotonic clock.
///
/// Timestamps persisted by the slower cache tiers are unix milliseconds, but
/// they advance together with `tokio::time`, so a paused test runtime moves
/// both the in-memory and the persisted view of "now".
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
    origin_unix_ms: i64,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_unix_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn now_unix_ms(&self) -> i64 {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        self.origin_unix_ms + elapsed.as_millis() as i64
    }

    /// Age of a timestamp produced by `now_unix_ms`, zero if it lies in the future.
    pub fn age_of(&self, unix_ms: i64) -> Duration {
        let delta = self.now_unix_ms() - unix_ms;
        Duration::from_millis(delta.max(0) as u64)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

/// Converts an absolute unix timestamp (seconds) into a tokio instant.
/// Timestamps in the past map to "now".
pub fn instant_from_unix(exp_unix_ts: i64) -> Instant {
    let remaining = exp_unix_ts - now_i64();
    Instant::now() + Duration::from_secs(remaining.max(0) as u64)
}
