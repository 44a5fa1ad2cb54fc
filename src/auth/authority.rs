use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use reqwest::Client;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::auth::credential::Scopes;
use crate::auth::parser::parse_authority_response;
use crate::config::loader::resolve_value;
use crate::config::settings::{AuthorityConfig, ExpiryConfig};

/// Credential acquisition failures. `Clone` because one single-flight result
/// is handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("credential acquisition failed: {0}")]
    Acquisition(String),
    #[error("malformed credential: {0}")]
    Malformed(String),
}

/// Raw authority answer, validated by the token provider before use.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Option<Instant>,
}

/// Boundary to whatever issues bearer tokens.
#[async_trait]
pub trait CredentialAuthority: Send + Sync {
    async fn acquire(&self, scopes: &Scopes) -> Result<IssuedToken, AuthError>;
}

/// OAuth2 client-credentials style authority: form post, JSON answer.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: Client,
    url: String,
    method: Method,
    headers: HashMap<String, String>,
    form: HashMap<String, String>,
    token_pointer: String,
    expiry: ExpiryConfig,
}

impl HttpAuthority {
    /// Resolves env/file values once, at construction.
    pub fn from_config(config: &AuthorityConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let headers = config
            .headers
            .iter()
            .map(|(k, v)| resolve_value(v).map(|v| (k.to_owned(), v)))
            .collect::<anyhow::Result<HashMap<_, _>>>()?;
        let form = config
            .form
            .iter()
            .map(|(k, v)| resolve_value(v).map(|v| (k.to_owned(), v)))
            .collect::<anyhow::Result<HashMap<_, _>>>()?;

        Ok(Self {
            client,
            url: config.url.to_owned(),
            method: config.method.clone(),
            headers,
            form,
            token_pointer: config.token_pointer.to_owned(),
            expiry: config.expiry.clone(),
        })
    }
}

#[async_trait]
impl CredentialAuthority for HttpAuthority {
    async fn acquire(&self, scopes: &Scopes) -> Result<IssuedToken, AuthError> {
        let mut request = self.client.request(self.method.clone(), &self.url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let mut form = self.form.clone();
        if !scopes.is_empty() {
            form.insert("scope".to_owned(), scopes.to_string());
        }
        if !form.is_empty() {
            request = request.form(&form);
        }

        debug!(url = %self.url, scopes = %scopes, "requesting credential");
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "authority unreachable");
            AuthError::Acquisition("authority unreachable".to_owned())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Acquisition(format!("authority returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                warn!(error = %e.without_url(), "authority body unreadable");
                AuthError::Acquisition("authority body unreadable".to_owned())
            })?;
        parse_authority_response(&body, &self.token_pointer, &self.expiry)
    }
}
