//! Shared constants and defaults

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

// rate limiter
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_MAX_CALLS: usize = 60;

// cache tiers
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 60;
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;
pub const DEFAULT_LOCAL_TTL_SECS: u64 = 600;
pub const DEFAULT_REMOTE_TTL_SECS: u64 = 3600;

// client retry policy
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Used when a 429 carries no usable retry-after signal.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

// authority response
pub const DEFAULT_TOKEN_POINTER: &str = "access_token";
pub const DEFAULT_EXPIRY_POINTER: &str = "expires_in";

// server
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_CONFIG_PATH: &str = "api-agent.yaml";
