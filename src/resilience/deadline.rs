use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};

/// Marker returned when a suspension point runs past the caller's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

/// Absolute deadline threaded through every suspension point of a call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Instant,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self { started, at: started + timeout }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Drives `fut` until it completes or the deadline passes; the future is
    /// dropped (and thereby cancelled) in the latter case.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        timeout_at(self.at, fut).await.map_err(|_| DeadlineExceeded)
    }

    /// Sleeps for `wait`, or until the deadline if that comes first.
    pub async fn sleep(&self, wait: Duration) -> Result<(), DeadlineExceeded> {
        let wake = Instant::now() + wait;
        if wake > self.at {
            sleep_until(self.at).await;
            return Err(DeadlineExceeded);
        }
        sleep_until(wake).await;
        Ok(())
    }
}
