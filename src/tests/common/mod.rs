// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::auth::{AuthError, CredentialAuthority, IssuedToken, Scopes, TokenProvider};
use crate::cache::{CacheError, CacheStore, MemoryStore, TieredCache};
use crate::client::{ApiCallOutcome, ResilientApiClient, Transport, TransportRequest};
use crate::limiter::RateLimiter;
use crate::observability::{CallEvent, EventSink};
use crate::resilience::RetryPolicy;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Authority issuing `token-N` credentials after `delay`, counting calls.
pub struct CountingAuthority {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub lifetime: Duration,
}

impl CountingAuthority {
    pub fn new(delay: Duration, lifetime: Duration) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay, lifetime })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialAuthority for CountingAuthority {
    async fn acquire(&self, _scopes: &Scopes) -> Result<IssuedToken, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(IssuedToken {
            token: format!("token-{}", n),
            expires_at: Some(Instant::now() + self.lifetime),
        })
    }
}

/// Authority answering every call with the same canned result.
pub struct StaticAuthority {
    pub calls: AtomicUsize,
    pub result: Result<IssuedToken, AuthError>,
}

impl StaticAuthority {
    pub fn new(result: Result<IssuedToken, AuthError>) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), result })
    }
}

#[async_trait]
impl CredentialAuthority for StaticAuthority {
    async fn acquire(&self, _scopes: &Scopes) -> Result<IssuedToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// One recorded dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub at: Instant,
    pub authorization: Option<String>,
}

/// Transport replaying scripted outcomes in order, then `fallback` forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ApiCallOutcome>>,
    fallback: ApiCallOutcome,
    latency: Duration,
    pub dispatched: Mutex<Vec<Dispatched>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ApiCallOutcome>, fallback: ApiCallOutcome) -> Arc<Self> {
        Self::with_latency(script, fallback, Duration::ZERO)
    }

    pub fn with_latency(
        script: Vec<ApiCallOutcome>,
        fallback: ApiCallOutcome,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            latency,
            dispatched: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.dispatched.lock().len()
    }

    pub fn instants(&self) -> Vec<Instant> {
        self.dispatched.lock().iter().map(|d| d.at).collect()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.dispatched.lock().iter().map(|d| d.authorization.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: TransportRequest<'_>) -> ApiCallOutcome {
        self.dispatched.lock().push(Dispatched {
            at: Instant::now(),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Store whose every operation fails, standing in for an unreachable tier.
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Store("store unreachable".into()))
    }

    async fn put(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
        Err(CacheError::Store("store unreachable".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Store("store unreachable".into()))
    }
}

/// In-memory store whose next `get` reads its value, then parks until
/// `release` is notified, signalling `entered` once it is parked.
#[derive(Default)]
pub struct GatedStore {
    pub inner: MemoryStore,
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStore for GatedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = self.inner.get(key).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        value
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }
}

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<CallEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &CallEvent) {
        self.events.lock().push(event.clone());
    }
}

pub fn retry_policy(max_retries: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(base_ms),
        max_delay: Duration::from_millis(max_ms),
        jitter_ratio: 0.0,
    }
}

/// Client parts a test wants to poke at after the call.
pub struct Harness {
    pub client: ResilientApiClient,
    pub authority: Arc<CountingAuthority>,
    pub events: Arc<RecordingSink>,
}

pub fn harness(
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    cache: TieredCache,
    retry: RetryPolicy,
    timeout: Duration,
) -> Harness {
    let authority = CountingAuthority::new(Duration::ZERO, Duration::from_secs(3600));
    let events = Arc::new(RecordingSink::default());
    let tokens = TokenProvider::new(authority.clone(), Duration::from_secs(60));
    let client = ResilientApiClient::new(
        transport,
        Arc::new(tokens),
        Arc::new(limiter),
        Arc::new(cache),
        events.clone(),
        retry,
        timeout,
        Scopes::new(["read"]),
    );
    Harness { client, authority, events }
}
