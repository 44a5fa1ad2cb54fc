use rand::Rng;
use std::time::Duration;

use crate::config::settings::ClientConfig;

/// Retry bounds and exponential backoff for one logical call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on dispatch attempts per call (first attempt included).
    pub max_retries: u32,
    pub base_delay: Duration,
    /// invariant: >= base_delay
    pub max_delay: Duration,
    /// Jitter added on top of the capped delay, as a fraction of it (0.0 disables).
    pub jitter_ratio: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// `base × 2^retry`, capped at `max_delay`. `retry` is zero for the first retry.
    pub fn capped_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Capped delay plus a random jitter in `[0, jitter_ratio × delay]`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let capped = self.capped_delay(retry);
        let jitter_range = capped.mul_f64(self.jitter_ratio.clamp(0.0, 1.0));
        if jitter_range.is_zero() {
            return capped;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=jitter_range.as_millis() as u64);
        capped + Duration::from_millis(jitter_ms)
    }

    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}
