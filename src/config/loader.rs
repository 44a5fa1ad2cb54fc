use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::{ConfigValue, LogFormat, LoggingConfig, ServiceConfig};
use crate::config::validator;

/// Load, expand and validate config from a YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config '{}'", path.display()))?;

    let expanded = expand_env_vars(&content);
    parse_config(&expanded)
}

pub fn parse_config(content: &str) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))
        .map_err(|e| anyhow!("Invalid config format: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging =
            Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }

    debug!("validating config ...");
    validator::validate_service_config(&service_config).map_err(|errors| {
        anyhow!(
            "config is not valid, total errors: {}\n{}",
            errors.len(),
            errors.join("\n")
        )
    })?;

    Ok(service_config)
}

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = ENV_PATTERN.get_or_init(|| {
        Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").expect("env pattern is a valid regex")
    });
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Resolves a header/form value from its configured source.
pub fn resolve_value(value: &ConfigValue) -> Result<String> {
    match value {
        ConfigValue::Literal { value } => Ok(value.to_owned()),
        ConfigValue::FromEnv { from_env } => {
            std::env::var(from_env).with_context(|| format!("env variable '{}'", from_env))
        }
        ConfigValue::FromFile { from_file } => std::fs::read_to_string(from_file)
            .map(|res| res.trim().to_string())
            .with_context(|| format!("reading value file '{}'", from_file)),
    }
}
