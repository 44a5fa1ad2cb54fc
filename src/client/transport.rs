use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use tracing::{debug, warn};

use crate::client::outcome::{ApiCallOutcome, FailureCause};
use crate::utils::constants::DEFAULT_RETRY_AFTER_SECS;

/// One attempt as handed to the transport, credential already attached.
#[derive(Debug)]
pub struct TransportRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub headers: HeaderMap,
    pub body: Option<&'a [u8]>,
}

/// Boundary to the remote service. Implementations classify every result,
/// network errors included, into an `ApiCallOutcome`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(&self, request: TransportRequest<'_>) -> ApiCallOutcome;
}

/// reqwest-backed transport against a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: TransportRequest<'_>) -> ApiCallOutcome {
        let url = self.url(request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(request.query);
        }
        if let Some(body) = request.body {
            builder = builder.body(body.to_vec());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return classify_send_error(&e),
        };

        let status = response.status();
        debug!(url = %url, status = %status, "upstream responded");
        if status.is_success() {
            return match response.bytes().await {
                Ok(bytes) => ApiCallOutcome::Success(bytes.to_vec()),
                Err(e) => {
                    warn!(error = %e.without_url(), "upstream body unreadable");
                    ApiCallOutcome::TransientFailure(FailureCause::with_status(
                        status.as_u16(),
                        "upstream body unreadable",
                    ))
                }
            };
        }
        classify_status(status, response.headers())
    }
}

/// Status mapping: 401 → auth, 429 → rate limited, 5xx → transient,
/// anything else that is not 2xx → permanent.
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> ApiCallOutcome {
    match status {
        s if s.is_success() => ApiCallOutcome::Success(Vec::new()),
        StatusCode::UNAUTHORIZED => ApiCallOutcome::AuthFailed,
        StatusCode::TOO_MANY_REQUESTS => ApiCallOutcome::RateLimited(parse_retry_after(headers)),
        s if s.is_server_error() => ApiCallOutcome::TransientFailure(FailureCause::with_status(
            s.as_u16(),
            "upstream server error",
        )),
        s => ApiCallOutcome::PermanentFailure(FailureCause::with_status(
            s.as_u16(),
            "upstream rejected request",
        )),
    }
}

fn classify_send_error(e: &reqwest::Error) -> ApiCallOutcome {
    warn!(error = %e, "upstream request failed");
    if e.is_builder() {
        return ApiCallOutcome::PermanentFailure(FailureCause::new("request could not be built"));
    }
    let message = if e.is_timeout() {
        "upstream timed out"
    } else if e.is_connect() {
        "upstream unreachable"
    } else {
        "upstream request failed"
    };
    ApiCallOutcome::TransientFailure(FailureCause::new(message))
}

/// `Retry-After` as delta-seconds or HTTP-date; one second when absent or
/// unparseable.
pub fn parse_retry_after(headers: &HeaderMap) -> Duration {
    let fallback = Duration::from_secs(DEFAULT_RETRY_AFTER_SECS);
    let Some(raw) = headers
        .get(http::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
    else {
        return fallback;
    };

    if let Ok(seconds) = raw.parse::<u64>() {
        return Duration::from_secs(seconds);
    }
    match DateTime::parse_from_rfc2822(raw) {
        Ok(at) => (at.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO),
        Err(_) => fallback,
    }
}
