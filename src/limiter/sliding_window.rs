use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::settings::RateLimitConfig;

#[derive(Debug, Default)]
struct WindowState {
    /// admission timestamps inside the trailing window, oldest first
    records: VecDeque<Instant>,
    /// server-signalled earliest instant for the next admission
    not_before: Option<Instant>,
}

/// Sliding-window limiter: at most `max_calls` admissions in any trailing
/// `window`.
///
/// The check and the append happen under one lock, so concurrent admitters
/// can never both observe a free slot and overshoot the cap.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_calls: usize,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_calls: usize) -> Self {
        Self {
            window,
            max_calls: max_calls.max(1),
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_seconds), config.max_calls)
    }

    /// Zero when admitted (and recorded), otherwise how long to wait before
    /// asking again.
    pub fn admit(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(not_before) = state.not_before {
            if not_before > now {
                return not_before - now;
            }
            state.not_before = None;
        }

        // purge records that left the window: boundary is (now - window)
        while let Some(&oldest) = state.records.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                state.records.pop_front();
            } else {
                break;
            }
        }

        if state.records.len() < self.max_calls {
            state.records.push_back(now);
            return Duration::ZERO;
        }

        // full window: wait until the oldest record expires
        let wait = state
            .records
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        debug!(wait = ?wait, in_window = state.records.len(), "rate limit reached");
        wait
    }

    /// Server-side retry-after: the next admission waits `retry_after` no
    /// matter what the local window says. A later signal never shortens an
    /// earlier, longer one.
    pub fn defer(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        let mut state = self.state.lock();
        state.not_before = Some(match state.not_before {
            Some(existing) if existing > until => existing,
            _ => until,
        });
        debug!(retry_after = ?retry_after, "admission deferred by server signal");
    }

    /// Admissions currently counted in the window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock();
        state
            .records
            .iter()
            .filter(|r| now.saturating_duration_since(**r) < self.window)
            .count()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }
}
