//! # Resilient API access layer
//!
//! Calls a rate-limited, authenticated upstream API through one entry point
//! that caches, throttles, authenticates and retries on the caller's behalf.
//!
//! Modules:
//! - `auth`: credentials, the authority boundary and the single-flight token provider
//! - `limiter`: sliding-window admission control
//! - `cache`: memory / local / remote response tiers
//! - `client`: request model, transport and the `ResilientApiClient`
//! - `resilience`: backoff policy and call deadlines
//! - `observability`: call events, prometheus metrics
//! - `config`: YAML configuration, defaults and validation
//! - `server`: axum host serving the passthrough, health and metrics routes

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod helpers;
pub mod limiter;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::client::{ApiRequest, CallError, ResilientApiClient};
pub use crate::config::ServiceConfig;
