use http::Method;
use serde::Deserialize;
use std::collections::HashMap;

use crate::utils::constants::*;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub upstream: UpstreamConfig,
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

/// ================================
/// Remote service
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// ================================
/// Credential authority
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AuthorityConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_authority_method")]
    pub method: Method,
    #[serde(default)]
    pub headers: HashMap<String, ConfigValue>,
    /// form-encoded body fields (client_id, client_secret, grant_type, ...)
    #[serde(default)]
    pub form: HashMap<String, ConfigValue>,
    /// scopes requested when a call does not name its own
    #[serde(default)]
    pub scopes: Vec<String>,
    /// JSON field holding the bearer token
    #[serde(default = "default_token_pointer")]
    pub token_pointer: String,
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

/// Where a credential's expiry comes from.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ExpiryConfig {
    /// JSON field of the authority response
    Field {
        pointer: String,
        #[serde(default)]
        format: ExpiryFormat,
    },
    /// `exp` claim of the token itself (JWT)
    #[serde(rename = "self")]
    SelfClaim,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        ExpiryConfig::Field { pointer: DEFAULT_EXPIRY_POINTER.to_owned(), format: ExpiryFormat::Seconds }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryFormat {
    /// Duration in seconds until expiration.
    #[default]
    Seconds,
    /// Unix timestamp (integer seconds since epoch)
    Unix,
}

/// Header and form value sources
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ConfigValue {
    Literal { value: String },
    FromEnv { from_env: String },
    FromFile { from_file: String },
}

/// ================================
/// Components
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    #[serde(default = "default_safety_margin_seconds")]
    pub safety_margin_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { safety_margin_seconds: default_safety_margin_seconds() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_seconds: default_window_seconds(), max_calls: default_max_calls() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub memory: MemoryTierConfig,
    /// absent = local tier disabled
    pub local: Option<LocalTierConfig>,
    /// absent = remote tier disabled
    pub remote: Option<RemoteTierConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryTierConfig {
    #[serde(default = "default_memory_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_memory_capacity")]
    pub capacity: usize,
}

impl Default for MemoryTierConfig {
    fn default() -> Self {
        Self { ttl_seconds: default_memory_ttl_seconds(), capacity: default_memory_capacity() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalTierConfig {
    pub path: String,
    #[serde(default = "default_local_ttl_seconds")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteTierConfig {
    pub url: String,
    #[serde(default = "default_remote_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// will be multiplied by 2 on every retry until max_backoff_ms
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// invariant: >= base_backoff_ms
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    /// overall budget for one logical call, retries included
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ratio: default_jitter_ratio(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> String {
    DEFAULT_PORT.to_string()
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
fn default_authority_method() -> Method {
    Method::POST
}
fn default_token_pointer() -> String {
    DEFAULT_TOKEN_POINTER.to_string()
}
fn default_safety_margin_seconds() -> u64 {
    DEFAULT_SAFETY_MARGIN_SECS
}
fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECS
}
fn default_max_calls() -> usize {
    DEFAULT_MAX_CALLS
}
fn default_memory_ttl_seconds() -> u64 {
    DEFAULT_MEMORY_TTL_SECS
}
fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}
fn default_local_ttl_seconds() -> u64 {
    DEFAULT_LOCAL_TTL_SECS
}
fn default_remote_ttl_seconds() -> u64 {
    DEFAULT_REMOTE_TTL_SECS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_backoff_ms() -> u64 {
    DEFAULT_BASE_BACKOFF_MS
}
fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}
fn default_jitter_ratio() -> f64 {
    DEFAULT_JITTER_RATIO
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
