use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::cache::key::storage_name;
use crate::cache::store::{CacheError, CacheStore};

/// Shared remote store over plain HTTP: `GET|PUT|DELETE {base}/{sha256(key)}`.
/// 404 on read is a miss, 404 on delete is success.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, storage_name(key))
    }
}

fn store_error(op: &str, e: reqwest::Error) -> CacheError {
    CacheError::Store(format!("remote {} failed: {}", op, e.without_url()))
}

#[async_trait]
impl CacheStore for HttpStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let response = self
            .client
            .get(self.url(key))
            .send()
            .await
            .map_err(|e| store_error("get", e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(|e| store_error("get", e))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(CacheError::Store(format!("remote get returned {}", status))),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let response = self
            .client
            .put(self.url(key))
            .body(value.to_vec())
            .send()
            .await
            .map_err(|e| store_error("put", e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CacheError::Store(format!("remote put returned {}", response.status())))
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let response = self
            .client
            .delete(self.url(key))
            .send()
            .await
            .map_err(|e| store_error("delete", e))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(CacheError::Store(format!("remote delete returned {}", status)))
        }
    }
}
