#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::routing::post;
    use futures::future::join_all;
    use futures::StreamExt;
    use http::Method;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use tokio::time::{advance, Instant};

    use crate::auth::{AuthError, CredentialAuthority, HttpAuthority, IssuedToken, Scopes, TokenProvider};
    use crate::config::settings::{AuthorityConfig, ConfigValue, ExpiryConfig};
    use crate::tests::common::{json, spawn_axum, CountingAuthority, Router, StaticAuthority};

    const MARGIN: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_acquisition() {
        let authority = CountingAuthority::new(Duration::from_millis(250), Duration::from_secs(3600));
        let provider = Arc::new(TokenProvider::new(authority.clone(), MARGIN));
        let scopes = Scopes::new(["read"]);

        let callers = (0..10).map(|_| {
            let provider = provider.clone();
            let scopes = scopes.clone();
            tokio::spawn(async move { provider.get_token(&scopes).await })
        });
        let results = join_all(callers).await;

        assert_eq!(authority.calls(), 1);
        for res in results {
            let credential = res.unwrap().unwrap();
            assert_eq!(credential.token(), "token-1");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_credential_is_reused_until_safety_margin() {
        let authority = CountingAuthority::new(Duration::ZERO, Duration::from_secs(3600));
        let provider = TokenProvider::new(authority.clone(), MARGIN);
        let scopes = Scopes::new(["read"]);

        let first = provider.get_token(&scopes).await.unwrap();
        advance(Duration::from_secs(3600 - 61)).await;
        let second = provider.get_token(&scopes).await.unwrap();
        assert_eq!(first.token(), second.token());
        assert_eq!(authority.calls(), 1);

        // 59s left: inside the safety margin
        advance(Duration::from_secs(2)).await;
        let third = provider.get_token(&scopes).await.unwrap();
        assert_eq!(third.token(), "token-2");
        assert_eq!(authority.calls(), 2);
        assert!(third.remaining() > MARGIN);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_sets_are_cached_independently() {
        let authority = CountingAuthority::new(Duration::ZERO, Duration::from_secs(3600));
        let provider = TokenProvider::new(authority.clone(), MARGIN);

        provider.get_token(&Scopes::new(["read", "write"])).await.unwrap();
        provider.get_token(&Scopes::new(["write", "read", "read"])).await.unwrap();
        assert_eq!(authority.calls(), 1);

        provider.get_token(&Scopes::new(["admin"])).await.unwrap();
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_cached_credential() {
        let authority = CountingAuthority::new(Duration::ZERO, Duration::from_secs(3600));
        let provider = TokenProvider::new(authority.clone(), MARGIN);
        let scopes = Scopes::new(["read"]);

        let first = provider.get_token(&scopes).await.unwrap();
        let refreshed = provider.refresh_token(&scopes).await.unwrap();
        assert_ne!(first.token(), refreshed.token());

        let cached = provider.get_token(&scopes).await.unwrap();
        assert_eq!(cached.token(), refreshed.token());
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_collapse() {
        let authority = CountingAuthority::new(Duration::from_millis(100), Duration::from_secs(3600));
        let provider = Arc::new(TokenProvider::new(authority.clone(), MARGIN));
        let scopes = Scopes::new(["read"]);
        provider.get_token(&scopes).await.unwrap();

        let refreshes = (0..5).map(|_| {
            let provider = provider.clone();
            let scopes = scopes.clone();
            tokio::spawn(async move { provider.refresh_token(&scopes).await })
        });
        for res in join_all(refreshes).await {
            assert_eq!(res.unwrap().unwrap().token(), "token-2");
        }
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_token_is_rejected() {
        let authority = StaticAuthority::new(Ok(IssuedToken {
            token: "  ".into(),
            expires_at: Some(Instant::now() + Duration::from_secs(3600)),
        }));
        let provider = TokenProvider::new(authority, MARGIN);

        let err = provider.get_token(&Scopes::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_expiry_is_rejected() {
        let authority = StaticAuthority::new(Ok(IssuedToken { token: "abc".into(), expires_at: None }));
        let provider = TokenProvider::new(authority, MARGIN);

        let err = provider.get_token(&Scopes::default()).await.unwrap_err();
        assert_eq!(err, AuthError::Malformed("missing expiry".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_within_margin_is_rejected() {
        let authority = StaticAuthority::new(Ok(IssuedToken {
            token: "abc".into(),
            expires_at: Some(Instant::now() + Duration::from_secs(30)),
        }));
        let provider = TokenProvider::new(authority, MARGIN);

        let err = provider.get_token(&Scopes::default()).await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let authority = StaticAuthority::new(Err(AuthError::Acquisition("authority returned 503".into())));
        let provider = TokenProvider::new(authority.clone(), MARGIN);
        let scopes = Scopes::new(["read"]);

        assert!(provider.get_token(&scopes).await.is_err());
        assert!(provider.get_token(&scopes).await.is_err());
        assert_eq!(authority.calls.load(Ordering::SeqCst), 2);
    }

    fn authority_config(url: String) -> AuthorityConfig {
        AuthorityConfig {
            url,
            method: Method::POST,
            headers: HashMap::new(),
            form: HashMap::from([(
                "grant_type".to_owned(),
                ConfigValue::Literal { value: "client_credentials".into() },
            )]),
            scopes: vec!["read".into()],
            token_pointer: "access_token".into(),
            expiry: ExpiryConfig::default(),
        }
    }

    #[tokio::test]
    async fn http_authority_parses_token_endpoint_answer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(json!({
                        "access_token": "abc-123",
                        "expires_in": 3600,
                        "token_type": "Bearer"
                    }));
            })
            .await;

        let authority =
            HttpAuthority::from_config(&authority_config(server.url("/oauth/token")), Duration::from_secs(5)).unwrap();
        let issued = authority.acquire(&Scopes::new(["read"])).await.unwrap();

        mock.assert_async().await;
        assert_eq!(issued.token, "abc-123");
        let remaining = issued.expires_at.unwrap() - Instant::now();
        assert!(remaining > Duration::from_secs(3590) && remaining <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn http_authority_error_status_is_acquisition_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(401).body("invalid_client");
            })
            .await;

        let authority =
            HttpAuthority::from_config(&authority_config(server.url("/oauth/token")), Duration::from_secs(5)).unwrap();
        let err = authority.acquire(&Scopes::new(["read"])).await.unwrap_err();

        assert!(matches!(err, AuthError::Acquisition(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn http_authority_hides_transport_details_of_broken_body() {
        let router = Router::new().route(
            "/oauth/token",
            post(|| async {
                let chunks = futures::stream::iter(vec![
                    Ok::<_, std::io::Error>("{\"access_token\": \"abc"),
                    Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "cut off")),
                ])
                .then(|chunk| async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    chunk
                });
                Body::from_stream(chunks)
            }),
        );
        let (_handle, addr) = spawn_axum(router).await;
        let url = format!("http://{}/oauth/token", addr);

        let authority = HttpAuthority::from_config(&authority_config(url), Duration::from_secs(5)).unwrap();
        let err = authority.acquire(&Scopes::new(["read"])).await.unwrap_err();

        assert!(matches!(&err, AuthError::Acquisition(msg) if msg == "authority body unreadable"));
        assert!(!err.to_string().contains(&addr.to_string()));
    }
}
