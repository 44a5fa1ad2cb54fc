use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};

use crate::client::{ApiRequest, CachePolicy, CallError, ErrorKind, ResilientApiClient};
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::Metrics;
use crate::observability::routes;

/// Request headers forwarded to the upstream as-is.
const FORWARDED_HEADERS: [HeaderName; 3] = [header::ACCEPT, header::CONTENT_TYPE, header::ACCEPT_LANGUAGE];

static CACHE_HEADER: &str = "x-cache";
static ATTEMPTS_HEADER: &str = "x-upstream-attempts";

#[derive(Clone)]
pub struct AppState {
    pub metrics: Metrics,
    pub client: Arc<ResilientApiClient>,
}

impl AppState {
    pub fn new(metrics: Metrics, client: Arc<ResilientApiClient>) -> Self {
        Self { metrics, client }
    }
}

pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/{*path}", any(handle_api_call))
        .merge(routes::router(&settings_config.metrics))
        .with_state(state)
}

/// Serves the host routes until SIGINT/SIGTERM.
pub async fn start(settings_config: &SettingsConfig, state: AppState) -> Result<()> {
    let metrics = state.metrics.clone();
    let app = router(settings_config, state);

    let bind_addr = &settings_config.server.host;
    let port = &settings_config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port))
        .await
        .with_context(|| format!("failed to bind {}:{}", bind_addr, port))?;
    info!(address = %bind_addr, port = %port, "server listening");

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    metrics.up.set(0);
    info!("server stopped");

    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Forwards `/api/{path}` through the resilient client.
async fn handle_api_call(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request = ApiRequest::new(method, format!("/{}", path))
        .with_cache_policy(cache_policy(&headers));
    request.query = query;
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            request.headers.insert(name, value.clone());
        }
    }
    if !body.is_empty() {
        request.body = Some(body.to_vec());
    }

    match state.client.execute(&request).await {
        Ok(response) => {
            let cache = response.cache_tier.map(|t| t.as_str()).unwrap_or("miss");
            let mut header_map = HeaderMap::new();
            header_map.insert(CACHE_HEADER, HeaderValue::from_static(cache));
            header_map.insert(ATTEMPTS_HEADER, HeaderValue::from(response.attempts));
            (StatusCode::OK, header_map, response.payload).into_response()
        }
        Err(e) => {
            warn!(path = %request.path, error = %e, "api call failed");
            error_response(&e)
        }
    }
}

/// `no-store` wins over `no-cache`; anything else uses the cache.
pub fn cache_policy(headers: &HeaderMap) -> CachePolicy {
    let directives: Vec<String> = headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|d| d.trim().to_ascii_lowercase())
        .collect();

    if directives.iter().any(|d| d == "no-store") {
        CachePolicy::Skip
    } else if directives.iter().any(|d| d == "no-cache") {
        CachePolicy::Refresh
    } else {
        CachePolicy::Use
    }
}

pub fn error_status(error: &CallError) -> StatusCode {
    match error.kind {
        ErrorKind::PermanentFailure => error
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        ErrorKind::TransientFailure if error.is_deadline_exceeded() => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::TransientFailure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::AuthFailed => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(error: &CallError) -> Response {
    let body = json!({
        "kind": error.kind.as_str(),
        "attempts": error.attempts,
        "elapsed_ms": error.elapsed.as_millis() as u64,
        "reason": error.reason,
    });
    (error_status(error), Json(body)).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
