use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::auth::credential::Scopes;
use crate::cache::key::CacheKey;

/// How a call interacts with the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// read, then write on success
    #[default]
    Use,
    /// skip the read, still write the fresh response
    Refresh,
    /// neither read nor write
    Skip,
}

/// One logical API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub cache_policy: CachePolicy,
    /// overrides the client's default scopes
    pub scopes: Option<Scopes>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            cache_policy: CachePolicy::default(),
            scopes: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn with_scopes(mut self, scopes: Scopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Only read-only methods are ever cached.
    pub fn is_read_only(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    pub fn reads_cache(&self) -> bool {
        self.is_read_only() && self.cache_policy == CachePolicy::Use
    }

    pub fn writes_cache(&self) -> bool {
        self.is_read_only() && self.cache_policy != CachePolicy::Skip
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_request(&self.method, &self.path, &self.query, self.body.as_deref())
    }
}
