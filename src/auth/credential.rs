use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Normalized scope set: sorted and deduplicated, so `["b", "a", "a"]` and
/// `["a", "b"]` share one cached credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scopes(Vec<String>);

impl Scopes {
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scopes: Vec<String> = scopes
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.trim().is_empty())
            .collect();
        scopes.sort();
        scopes.dedup();
        Self(scopes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Bearer credential issued by the authority. Never mutated: a refresh
/// replaces the whole value.
#[derive(Clone)]
pub struct Credential {
    token: String,
    expires_at: Instant,
    scopes: Scopes,
}

impl Credential {
    pub fn new(token: String, expires_at: Instant, scopes: Scopes) -> Self {
        Self { token, expires_at, scopes }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// True while the remaining lifetime is strictly greater than `margin`.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.remaining() > margin
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// keeps the token out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"***")
            .field("remaining", &self.remaining())
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_normalized() {
        assert_eq!(Scopes::new(["write", "read", "read", " "]), Scopes::new(["read", "write"]));
        assert_eq!(Scopes::new(["b", "a"]).to_string(), "a b");
        assert!(Scopes::new(Vec::<String>::new()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn freshness_respects_margin() {
        let cred = Credential::new(
            "secret-value".into(),
            Instant::now() + Duration::from_secs(120),
            Scopes::default(),
        );
        assert!(cred.is_fresh(Duration::from_secs(60)));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!cred.is_fresh(Duration::from_secs(60)));
        assert!(!format!("{:?}", cred).contains("secret-value"));
    }
}
