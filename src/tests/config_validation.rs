#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use crate::config::loader::{expand_env_vars, file_to_config, parse_config, resolve_value};
    use crate::config::settings::{ConfigValue, ExpiryConfig, ExpiryFormat, LogFormat};
    use crate::config::validator::validate_service_config;
    use crate::utils::logging::{self, LogLevel};

    const MINIMAL: &str = r#"
upstream:
  base_url: https://api.example.com
authority:
  url: https://auth.example.com/token
"#;

    #[tokio::test]
    async fn shipped_config_is_valid() {
        let path = Path::new("api-agent.yaml");
        let service_config = file_to_config(path)
            .await
            .expect("api-agent.yaml must exist in repo root for tests");
        assert!(validate_service_config(&service_config).is_ok());
        assert!(service_config.cache.local.is_some());
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();

        assert_eq!(cfg.settings.server.port, "8080");
        assert_eq!(cfg.settings.metrics.path, "/metrics");
        assert_eq!(cfg.token.safety_margin_seconds, 60);
        assert_eq!(cfg.rate_limit.window_seconds, 60);
        assert_eq!(cfg.rate_limit.max_calls, 60);
        assert_eq!(cfg.cache.memory.capacity, 1024);
        assert!(cfg.cache.local.is_none() && cfg.cache.remote.is_none());
        assert_eq!(cfg.client.max_retries, 5);
        assert_eq!(cfg.client.base_backoff_ms, 200);
        assert_eq!(cfg.client.timeout_ms, 30_000);
        assert_eq!(cfg.authority.method, http::Method::POST);
        assert_eq!(cfg.authority.token_pointer, "access_token");
        assert!(matches!(
            &cfg.authority.expiry,
            ExpiryConfig::Field { pointer, format: ExpiryFormat::Seconds } if pointer == "expires_in"
        ));
        let logging = cfg.settings.logging.unwrap();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Compact);
    }

    #[test]
    fn jwt_expiry_source_parses() {
        let cfg = parse_config(&format!(
            "{}  expiry:\n    source: self\n",
            MINIMAL
        ))
        .unwrap();
        assert!(matches!(cfg.authority.expiry, ExpiryConfig::SelfClaim));
    }

    #[test]
    fn validation_aggregates_every_error() {
        let yaml = r#"
settings:
  server:
    port: "not-a-port"
  metrics:
    path: metrics
  logging:
    level: loud
    format: json
upstream:
  base_url: ftp://api.example.com
authority:
  url: https://auth.example.com/token
rate_limit:
  window_seconds: 0
  max_calls: 0
cache:
  memory:
    capacity: 0
client:
  max_retries: 0
  base_backoff_ms: 500
  max_backoff_ms: 100
  jitter_ratio: 1.5
"#;
        let cfg: crate::ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        let errors = validate_service_config(&cfg).unwrap_err();

        assert_eq!(errors.len(), 10, "{:#?}", errors);
        assert!(errors.iter().any(|e| e.contains("settings.server.port")));
        assert!(errors.iter().any(|e| e.contains("settings.metrics.path")));
        assert!(errors.iter().any(|e| e.contains("settings.logging.level")));
        assert!(errors.iter().any(|e| e.contains("upstream.base_url")));
        assert!(errors.iter().any(|e| e.contains("max_backoff_ms")));
        assert!(errors.iter().any(|e| e.contains("jitter_ratio")));

        let err = parse_config(yaml).unwrap_err().to_string();
        assert!(err.starts_with("config is not valid, total errors: 10"));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let err = parse_config("upstream: [").unwrap_err().to_string();
        assert!(err.contains("Invalid config format"));
    }

    #[test]
    #[serial]
    fn env_vars_are_expanded_with_defaults() {
        std::env::set_var("API_AGENT_TEST_UPSTREAM", "https://staging.example.com");
        std::env::remove_var("API_AGENT_TEST_MISSING");

        let expanded = expand_env_vars("a: ${API_AGENT_TEST_UPSTREAM}\nb: ${API_AGENT_TEST_MISSING:fallback}\nc: ${API_AGENT_TEST_MISSING}");
        assert_eq!(expanded, "a: https://staging.example.com\nb: fallback\nc: ");

        std::env::remove_var("API_AGENT_TEST_UPSTREAM");
    }

    #[test]
    #[serial]
    fn config_values_resolve_from_every_source() {
        std::env::set_var("API_AGENT_TEST_SECRET", "from-env");
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let literal = ConfigValue::Literal { value: "plain".into() };
        let env = ConfigValue::FromEnv { from_env: "API_AGENT_TEST_SECRET".into() };
        let from_file = ConfigValue::FromFile { from_file: file.path().display().to_string() };
        let missing = ConfigValue::FromEnv { from_env: "API_AGENT_TEST_UNSET".into() };

        assert_eq!(resolve_value(&literal).unwrap(), "plain");
        assert_eq!(resolve_value(&env).unwrap(), "from-env");
        assert_eq!(resolve_value(&from_file).unwrap(), "from-file");
        assert!(resolve_value(&missing).is_err());

        std::env::remove_var("API_AGENT_TEST_SECRET");
    }

    #[test]
    fn cli_log_level_wins_over_config() {
        let cfg = parse_config(MINIMAL).unwrap();

        assert_eq!(logging::resolve(&cfg, Some(LogLevel::DEBUG)).level, "debug");
        assert_eq!(logging::resolve(&cfg, None).level, "info");
    }
}
