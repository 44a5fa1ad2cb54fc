use http::Method;
use sha2::{Digest, Sha256};
use std::fmt;

/// Request identity: `METHOD /normalized/path#sha256(sorted query + body)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_request(
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Self {
        let mut query: Vec<&(String, String)> = query.iter().collect();
        query.sort();

        let mut hasher = Sha256::new();
        hasher.update((query.len() as u64).to_be_bytes());
        for (k, v) in query {
            update_framed(&mut hasher, k.as_bytes());
            update_framed(&mut hasher, v.as_bytes());
        }
        match body {
            Some(body) => {
                hasher.update([1u8]);
                update_framed(&mut hasher, body);
            }
            None => hasher.update([0u8]),
        }
        let fingerprint = hex::encode(hasher.finalize());

        Self(format!("{} {}#{}", method, normalize_path(path), fingerprint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length-prefixed so no two component lists hash the same bytes.
fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Leading `/`, no empty segments, no trailing `/` (except the root).
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// File/URL safe name for a key in the persistent stores.
pub fn storage_name(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
