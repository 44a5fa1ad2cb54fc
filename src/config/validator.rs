//! Configuration validation with aggregated errors.
//! - Collects every issue into Vec<String> instead of stopping at the first one
//! - Checks the invariants each component relies on:
//!   * rate limiter window / cap are positive
//!   * cache capacity and TTLs are positive
//!   * retry bounds (attempts, backoff ordering, jitter range, overall timeout)
//!   * upstream / authority / remote store URLs are http(s)
//!   * logging level and metrics path

use tracing::{error, info};

use crate::config::settings::{
    AuthorityConfig, CacheConfig, ClientConfig, ExpiryConfig, RateLimitConfig, ServiceConfig,
    SettingsConfig,
};

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_url("upstream.base_url", &cfg.upstream.base_url, &mut errors);
    if cfg.upstream.request_timeout_ms == 0 {
        errors.push("upstream.request_timeout_ms must be > 0".to_string());
    }
    validate_authority(&cfg.authority, &mut errors);
    validate_rate_limit(&cfg.rate_limit, &mut errors);
    validate_cache(&cfg.cache, &mut errors);
    validate_client(&cfg.client, &mut errors);

    // safety margin sane bounds
    if cfg.token.safety_margin_seconds > 60 * 60 * 24 {
        errors.push(format!(
            "token.safety_margin_seconds ({}) is unreasonably large",
            cfg.token.safety_margin_seconds
        ));
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_authority(authority: &AuthorityConfig, errors: &mut Vec<String>) {
    validate_url("authority.url", &authority.url, errors);
    if authority.token_pointer.trim().is_empty() {
        errors.push("authority.token_pointer must not be empty".to_string());
    }
    if let ExpiryConfig::Field { pointer, .. } = &authority.expiry {
        if pointer.trim().is_empty() {
            errors.push("authority.expiry.pointer must not be empty".to_string());
        }
    }
}

fn validate_rate_limit(rate_limit: &RateLimitConfig, errors: &mut Vec<String>) {
    if rate_limit.window_seconds == 0 {
        errors.push("rate_limit.window_seconds must be > 0".to_string());
    }
    if rate_limit.max_calls == 0 {
        errors.push("rate_limit.max_calls must be > 0".to_string());
    }
}

fn validate_cache(cache: &CacheConfig, errors: &mut Vec<String>) {
    if cache.memory.capacity == 0 {
        errors.push("cache.memory.capacity must be > 0".to_string());
    }
    if cache.memory.ttl_seconds == 0 {
        errors.push("cache.memory.ttl_seconds must be > 0".to_string());
    }
    if let Some(local) = &cache.local {
        if local.path.trim().is_empty() {
            errors.push("cache.local.path must not be empty".to_string());
        }
        if local.ttl_seconds == 0 {
            errors.push("cache.local.ttl_seconds must be > 0".to_string());
        }
    }
    if let Some(remote) = &cache.remote {
        validate_url("cache.remote.url", &remote.url, errors);
        if remote.ttl_seconds == 0 {
            errors.push("cache.remote.ttl_seconds must be > 0".to_string());
        }
    }
}

fn validate_client(client: &ClientConfig, errors: &mut Vec<String>) {
    if client.max_retries == 0 {
        errors.push("client.max_retries must be > 0".to_string());
    }
    if client.max_backoff_ms < client.base_backoff_ms {
        errors.push(format!(
            "client.max_backoff_ms ({}) must be >= base_backoff_ms ({})",
            client.max_backoff_ms, client.base_backoff_ms
        ));
    }
    if !(0.0..=1.0).contains(&client.jitter_ratio) {
        errors.push(format!(
            "client.jitter_ratio ({}) must be within [0, 1]",
            client.jitter_ratio
        ));
    }
    if client.timeout_ms == 0 {
        errors.push("client.timeout_ms must be > 0".to_string());
    }
}

fn validate_url(path: &str, value: &str, errors: &mut Vec<String>) {
    match reqwest::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "{} '{}' must use http or https, got '{}'",
            path,
            value,
            url.scheme()
        )),
        Err(e) => errors.push(format!("{} '{}' is not a valid url: {}", path, value, e)),
    }
}
