#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use http::header::AUTHORIZATION;
    use http::{HeaderValue, Method};

    use crate::client::{ApiCallOutcome, FailureCause, HttpTransport, Transport, TransportRequest};
    use crate::tests::common::{spawn_axum, Router};

    async fn echo(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_owned();
        let page = query.get("page").cloned().unwrap_or_default();
        format!("{}|{}", auth, page)
    }

    fn upstream() -> Router {
        Router::new()
            .route("/v1/echo", get(echo))
            .route("/v1/unauthorized", get(|| async { StatusCode::UNAUTHORIZED }))
            .route(
                "/v1/throttled",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "3")]) }),
            )
            .route("/v1/unavailable", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route("/v1/slow", get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }))
    }

    async fn call(transport: &HttpTransport, path: &str) -> ApiCallOutcome {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let query = vec![("page".to_owned(), "2".to_owned())];
        transport
            .dispatch(TransportRequest {
                method: &Method::GET,
                path,
                query: &query,
                headers,
                body: None,
            })
            .await
    }

    #[tokio::test]
    async fn statuses_are_classified() {
        let (_handle, addr) = spawn_axum(upstream()).await;
        let transport = HttpTransport::new(&format!("http://{}/v1/", addr), Duration::from_secs(2)).unwrap();

        assert_eq!(
            call(&transport, "/echo").await,
            ApiCallOutcome::Success(b"Bearer abc|2".to_vec())
        );
        assert_eq!(call(&transport, "unauthorized").await, ApiCallOutcome::AuthFailed);
        assert_eq!(
            call(&transport, "throttled").await,
            ApiCallOutcome::RateLimited(Duration::from_secs(3))
        );
        assert!(matches!(
            call(&transport, "unavailable").await,
            ApiCallOutcome::TransientFailure(FailureCause { status: Some(503), .. })
        ));
        assert!(matches!(
            call(&transport, "missing").await,
            ApiCallOutcome::PermanentFailure(FailureCause { status: Some(404), .. })
        ));
    }

    #[tokio::test]
    async fn timeout_is_transient() {
        let (_handle, addr) = spawn_axum(upstream()).await;
        let transport = HttpTransport::new(&format!("http://{}/v1", addr), Duration::from_millis(200)).unwrap();

        assert_eq!(
            call(&transport, "slow").await,
            ApiCallOutcome::TransientFailure(FailureCause::new("upstream timed out"))
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            call(&transport, "anything").await,
            ApiCallOutcome::TransientFailure(FailureCause { status: None, .. })
        ));
    }
}
