use std::sync::Arc;
use std::time::Duration;

use http::Method;
use tracing::{error, info};

use crate::cache::entry::Tier;
use crate::client::error::ErrorKind;

/// Terminal state of a logical call, as reported to sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Success,
    Failure(ErrorKind),
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Success => "success",
            EventOutcome::Failure(kind) => kind.as_str(),
        }
    }
}

/// Structured record emitted once per logical call.
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub method: Method,
    pub path: String,
    pub outcome: EventOutcome,
    pub attempts: u32,
    /// time spent in admission waits and backoff
    pub total_wait: Duration,
    pub elapsed: Duration,
    /// tier that served the response, `None` when it came from upstream
    pub cache_tier: Option<Tier>,
    /// a cache write after success failed (soft)
    pub cache_write_failed: bool,
    /// why a failed call gave up
    pub reason: Option<String>,
}

/// Fire-and-forget observer. Implementations must return quickly and must not
/// panic; the call path never waits on them.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &CallEvent);
}

/// Logs every call event through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &CallEvent) {
        let cache_tier = event.cache_tier.map(|t| t.as_str()).unwrap_or("none");
        match event.outcome {
            EventOutcome::Success => info!(
                method = %event.method,
                path = %event.path,
                attempts = event.attempts,
                wait_ms = event.total_wait.as_millis() as u64,
                elapsed_ms = event.elapsed.as_millis() as u64,
                cache_tier,
                cache_write_failed = event.cache_write_failed,
                "api call succeeded"
            ),
            EventOutcome::Failure(kind) => error!(
                method = %event.method,
                path = %event.path,
                kind = %kind,
                attempts = event.attempts,
                wait_ms = event.total_wait.as_millis() as u64,
                elapsed_ms = event.elapsed.as_millis() as u64,
                reason = event.reason.as_deref().unwrap_or(""),
                "api call failed"
            ),
        }
    }
}

/// Fans one event out to several sinks.
#[derive(Clone, Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for CompositeSink {
    fn record(&self, event: &CallEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
