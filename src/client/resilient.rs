use std::sync::Arc;
use std::time::Duration;

use http::header::AUTHORIZATION;
use http::HeaderValue;
use tracing::{debug, warn};

use crate::auth::credential::{Credential, Scopes};
use crate::auth::token_provider::TokenProvider;
use crate::cache::entry::Tier;
use crate::cache::tiered::TieredCache;
use crate::client::error::{CallError, ErrorKind, DEADLINE_EXCEEDED};
use crate::client::outcome::ApiCallOutcome;
use crate::client::request::ApiRequest;
use crate::client::transport::{Transport, TransportRequest};
use crate::limiter::RateLimiter;
use crate::observability::events::{CallEvent, EventOutcome, EventSink};
use crate::resilience::{Deadline, RetryPolicy};

/// Successful call result.
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub payload: Vec<u8>,
    /// dispatch attempts, zero for a cache hit
    pub attempts: u32,
    pub total_wait: Duration,
    pub elapsed: Duration,
    pub cache_tier: Option<Tier>,
}

/// Bookkeeping for one logical call.
struct CallState {
    attempts: u32,
    total_wait: Duration,
    auth_refreshed: bool,
}

impl CallState {
    fn new() -> Self {
        Self { attempts: 0, total_wait: Duration::ZERO, auth_refreshed: false }
    }
}

/// Runs one logical API call through cache, rate limiter, token provider
/// and transport, retrying what is retryable.
///
/// All collaborators are shared handles, so one client (or many clones of
/// the same parts) can serve concurrent calls.
pub struct ResilientApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenProvider>,
    limiter: Arc<RateLimiter>,
    cache: Arc<TieredCache>,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
    timeout: Duration,
    default_scopes: Scopes,
}

impl ResilientApiClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenProvider>,
        limiter: Arc<RateLimiter>,
        cache: Arc<TieredCache>,
        events: Arc<dyn EventSink>,
        retry: RetryPolicy,
        timeout: Duration,
        default_scopes: Scopes,
    ) -> Self {
        Self { transport, tokens, limiter, cache, events, retry, timeout, default_scopes }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<CallResponse, CallError> {
        self.execute_with_timeout(request, self.timeout).await
    }

    /// Same as `execute` with a caller-supplied overall budget.
    pub async fn execute_with_timeout(
        &self,
        request: &ApiRequest,
        timeout: Duration,
    ) -> Result<CallResponse, CallError> {
        let deadline = Deadline::after(timeout);
        let key = request.cache_key();

        // -------------------------------
        // 1. CacheCheck
        // -------------------------------
        if request.reads_cache() {
            if let Ok(Some(hit)) = deadline.run(self.cache.get(key.as_str())).await {
                let response = CallResponse {
                    payload: hit.entry.value,
                    attempts: 0,
                    total_wait: Duration::ZERO,
                    elapsed: deadline.elapsed(),
                    cache_tier: Some(hit.tier),
                };
                self.report(request, EventOutcome::Success, &CallState::new(), &deadline, Some(hit.tier), false, None);
                return Ok(response);
            }
        }

        let scopes = request.scopes.as_ref().unwrap_or(&self.default_scopes);
        let mut state = CallState::new();

        loop {
            if deadline.is_expired() {
                return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
            }

            // -------------------------------
            // 2. Admission
            // -------------------------------
            if self.admit(&deadline, &mut state).await.is_err() {
                return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
            }

            // -------------------------------
            // 3. Authenticate
            // -------------------------------
            let credential = match deadline.run(self.tokens.get_token(scopes)).await {
                Ok(Ok(credential)) => credential,
                Ok(Err(e)) => {
                    return Err(self.fail(request, &state, &deadline, ErrorKind::AuthFailed, &e.to_string(), None));
                }
                Err(_) => {
                    return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
                }
            };

            // -------------------------------
            // 4. Dispatch
            // -------------------------------
            state.attempts += 1;
            debug!(method = %request.method, path = %request.path, attempt = state.attempts, "dispatching");
            let outcome = match deadline.run(self.dispatch(request, &credential)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
                }
            };

            // -------------------------------
            // 5. Outcome handling
            // -------------------------------
            match outcome {
                ApiCallOutcome::Success(payload) => {
                    let cache_write_failed = self.store(request, key.as_str(), &payload).await;
                    let response = CallResponse {
                        payload,
                        attempts: state.attempts,
                        total_wait: state.total_wait,
                        elapsed: deadline.elapsed(),
                        cache_tier: None,
                    };
                    self.report(request, EventOutcome::Success, &state, &deadline, None, cache_write_failed, None);
                    return Ok(response);
                }
                ApiCallOutcome::RateLimited(retry_after) => {
                    self.limiter.defer(retry_after);
                    if self.retry.attempts_exhausted(state.attempts) {
                        return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, "rate limited, retries exhausted", Some(429)));
                    }
                    warn!(path = %request.path, attempt = state.attempts, retry_after = ?retry_after, "rate limited by upstream");
                }
                ApiCallOutcome::TransientFailure(cause) => {
                    if self.retry.attempts_exhausted(state.attempts) {
                        return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, &cause.message, cause.status));
                    }
                    let delay = self.retry.backoff(state.attempts - 1);
                    warn!(path = %request.path, attempt = state.attempts, delay = ?delay, cause = %cause, "transient failure, backing off");
                    state.total_wait += delay.min(deadline.remaining());
                    if deadline.sleep(delay).await.is_err() {
                        return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
                    }
                }
                ApiCallOutcome::AuthFailed => {
                    if state.auth_refreshed {
                        return Err(self.fail(request, &state, &deadline, ErrorKind::AuthFailed, "credential rejected after refresh", Some(401)));
                    }
                    if self.retry.attempts_exhausted(state.attempts) {
                        return Err(self.fail(request, &state, &deadline, ErrorKind::AuthFailed, "credential rejected", Some(401)));
                    }
                    state.auth_refreshed = true;
                    warn!(path = %request.path, "credential rejected, forcing refresh");
                    match deadline.run(self.tokens.refresh_token(scopes)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            return Err(self.fail(request, &state, &deadline, ErrorKind::AuthFailed, &e.to_string(), None));
                        }
                        Err(_) => {
                            return Err(self.fail(request, &state, &deadline, ErrorKind::TransientFailure, DEADLINE_EXCEEDED, None));
                        }
                    }
                }
                ApiCallOutcome::PermanentFailure(cause) => {
                    return Err(self.fail(request, &state, &deadline, ErrorKind::PermanentFailure, &cause.message, cause.status));
                }
            }
        }
    }

    /// Loops on the limiter until admitted, sleeping for each suggested wait.
    async fn admit(&self, deadline: &Deadline, state: &mut CallState) -> Result<(), ()> {
        loop {
            let wait = self.limiter.admit();
            if wait.is_zero() {
                return Ok(());
            }
            debug!(wait = ?wait, "waiting for admission");
            state.total_wait += wait.min(deadline.remaining());
            deadline.sleep(wait).await.map_err(|_| ())?;
        }
    }

    async fn dispatch(&self, request: &ApiRequest, credential: &Credential) -> ApiCallOutcome {
        let mut headers = request.headers.clone();
        match HeaderValue::from_str(&credential.authorization_header()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => return ApiCallOutcome::AuthFailed,
        }

        self.transport
            .dispatch(TransportRequest {
                method: &request.method,
                path: &request.path,
                query: &request.query,
                headers,
                body: request.body.as_deref(),
            })
            .await
    }

    /// Returns true when the write failed (soft).
    async fn store(&self, request: &ApiRequest, key: &str, payload: &[u8]) -> bool {
        if !request.writes_cache() {
            return false;
        }
        match self.cache.put(key, payload.to_vec()).await {
            Ok(report) => report.remote_failed,
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                true
            }
        }
    }

    fn fail(
        &self,
        request: &ApiRequest,
        state: &CallState,
        deadline: &Deadline,
        kind: ErrorKind,
        reason: &str,
        status: Option<u16>,
    ) -> CallError {
        self.report(request, EventOutcome::Failure(kind), state, deadline, None, false, Some(reason));
        CallError {
            kind,
            attempts: state.attempts,
            elapsed: deadline.elapsed(),
            reason: reason.to_owned(),
            status,
        }
    }

    fn report(
        &self,
        request: &ApiRequest,
        outcome: EventOutcome,
        state: &CallState,
        deadline: &Deadline,
        cache_tier: Option<Tier>,
        cache_write_failed: bool,
        reason: Option<&str>,
    ) {
        self.events.record(&CallEvent {
            method: request.method.clone(),
            path: request.path.clone(),
            outcome,
            attempts: state.attempts,
            total_wait: state.total_wait,
            elapsed: deadline.elapsed(),
            cache_tier,
            cache_write_failed,
            reason: reason.map(str::to_owned),
        });
    }
}
