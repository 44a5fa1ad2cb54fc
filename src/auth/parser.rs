use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::authority::{AuthError, IssuedToken};
use crate::config::settings::{ExpiryConfig, ExpiryFormat};
use crate::helpers::time::{instant_from_unix, now_i64};

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Extract the bearer token and its expiry from an authority response body.
///
/// A missing expiry is not an error here; it is reported as `expires_at: None`
/// and rejected by the token provider together with every other authority.
pub fn parse_authority_response(
    body: &str,
    token_pointer: &str,
    expiry: &ExpiryConfig,
) -> Result<IssuedToken, AuthError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| AuthError::Malformed(format!("authority body is not valid JSON: {}", e)))?;

    let token = lookup(&json, token_pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            AuthError::Malformed(format!("field '{}' not found or not a string", token_pointer))
        })?;

    let exp_unix_ts = match expiry {
        ExpiryConfig::Field { pointer, format } => lookup(&json, pointer)
            .and_then(as_i64)
            .map(|raw| match format {
                ExpiryFormat::Seconds => now_i64() + raw,
                ExpiryFormat::Unix => raw,
            }),
        ExpiryConfig::SelfClaim => match get_jwt_expiration(&token) {
            Ok(exp) => Some(exp),
            Err(e) => {
                warn!(error = %e, "jwt expiry could not be read");
                None
            }
        },
    };

    debug!(expires_at = ?exp_unix_ts, "authority response parsed");
    Ok(IssuedToken {
        token,
        expires_at: exp_unix_ts.map(instant_from_unix),
    })
}

/// `/a/b` style pointers use JSON pointer syntax, anything else is a top level key.
fn lookup<'a>(json: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.starts_with('/') {
        json.pointer(pointer)
    } else {
        json.get(pointer)
    }
}

// some authorities send "3600" instead of 3600
fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
}

fn get_jwt_expiration(token: &str) -> Result<i64, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Malformed("invalid JWT format".to_owned()));
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| AuthError::Malformed(format!("base64 decode error: {}", e)))?;

    serde_json::from_slice::<JwtClaims>(&decoded)
        .map(|claims| claims.exp)
        .map_err(|e| AuthError::Malformed(format!("invalid JWT payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn sample_jwt(exp: i64) -> String {
        // minimal unsigned JWT for tests: {"exp": exp}
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("{}.{}.", header, payload)
    }

    fn seconds_field() -> ExpiryConfig {
        ExpiryConfig::Field { pointer: "expires_in".into(), format: ExpiryFormat::Seconds }
    }

    #[tokio::test]
    async fn relative_seconds_expiry() {
        let body = json!({"access_token": "abc", "expires_in": 3600}).to_string();
        let issued = parse_authority_response(&body, "access_token", &seconds_field()).unwrap();
        assert_eq!(issued.token, "abc");
        let remaining = issued.expires_at.unwrap() - Instant::now();
        assert!(remaining > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn string_encoded_unix_expiry_behind_pointer() {
        let exp = now_i64() + 120;
        let body = json!({"data": {"token": "xyz", "exp": exp.to_string()}}).to_string();
        let expiry = ExpiryConfig::Field { pointer: "/data/exp".into(), format: ExpiryFormat::Unix };
        let issued = parse_authority_response(&body, "/data/token", &expiry).unwrap();
        assert_eq!(issued.token, "xyz");
        assert!(issued.expires_at.is_some());
    }

    #[tokio::test]
    async fn jwt_self_claim_expiry() {
        let jwt = sample_jwt(now_i64() + 600);
        let body = json!({"access_token": jwt}).to_string();
        let issued = parse_authority_response(&body, "access_token", &ExpiryConfig::SelfClaim).unwrap();
        assert!(issued.expires_at.unwrap() > Instant::now() + Duration::from_secs(590));
    }

    #[test]
    fn missing_token_is_malformed() {
        let body = json!({"expires_in": 60}).to_string();
        let err = parse_authority_response(&body, "access_token", &seconds_field()).unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn missing_expiry_is_reported_as_none() {
        let body = json!({"access_token": "abc"}).to_string();
        let issued = parse_authority_response(&body, "access_token", &seconds_field()).unwrap();
        assert!(issued.expires_at.is_none());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_authority_response("{oops", "access_token", &seconds_field()).unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }
}
