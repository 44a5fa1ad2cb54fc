use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::{HttpAuthority, Scopes, TokenProvider};
use crate::cache::{FileStore, HttpStore, MemoryTier, StoreTier, TieredCache};
use crate::client::resilient::ResilientApiClient;
use crate::client::transport::HttpTransport;
use crate::config::settings::CacheConfig;
use crate::config::ServiceConfig;
use crate::limiter::RateLimiter;
use crate::observability::events::EventSink;
use crate::resilience::RetryPolicy;

/// Builds the tiered cache described by `config`; absent tiers stay disabled.
pub fn build_cache(config: &CacheConfig) -> Result<TieredCache> {
    let memory = MemoryTier::new(
        config.memory.capacity,
        Duration::from_secs(config.memory.ttl_seconds),
    );

    let local = config.local.as_ref().map(|local| {
        info!(path = %local.path, ttl_seconds = local.ttl_seconds, "local cache tier enabled");
        StoreTier::new(
            Arc::new(FileStore::new(&local.path)),
            Duration::from_secs(local.ttl_seconds),
        )
    });

    let remote = match &config.remote {
        Some(remote) => {
            let store = HttpStore::new(&remote.url, Duration::from_millis(remote.request_timeout_ms))
                .with_context(|| format!("remote cache tier at {}", remote.url))?;
            info!(url = %remote.url, ttl_seconds = remote.ttl_seconds, "remote cache tier enabled");
            Some(StoreTier::new(Arc::new(store), Duration::from_secs(remote.ttl_seconds)))
        }
        None => None,
    };

    Ok(TieredCache::new(memory, local, remote))
}

/// Wires every component of the access layer from one validated config.
pub fn build_client(config: &ServiceConfig, events: Arc<dyn EventSink>) -> Result<ResilientApiClient> {
    let request_timeout = Duration::from_millis(config.upstream.request_timeout_ms);

    let authority = HttpAuthority::from_config(&config.authority, request_timeout)
        .context("credential authority")?;
    let tokens = TokenProvider::new(
        Arc::new(authority),
        Duration::from_secs(config.token.safety_margin_seconds),
    );
    let transport = HttpTransport::new(&config.upstream.base_url, request_timeout)
        .context("upstream transport")?;

    Ok(ResilientApiClient::new(
        Arc::new(transport),
        Arc::new(tokens),
        Arc::new(RateLimiter::from_config(&config.rate_limit)),
        Arc::new(build_cache(&config.cache)?),
        events,
        RetryPolicy::from_config(&config.client),
        Duration::from_millis(config.client.timeout_ms),
        Scopes::new(config.authority.scopes.iter().cloned()),
    ))
}
