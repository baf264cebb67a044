//! Request tracking and observability middleware.
//!
//! [`with_request_tracing`] wraps a router so that every request:
//!
//! 1. gets an `x-request-id` (kept from the caller if present, otherwise a UUID)
//! 2. runs inside an `http_request` tracing span carrying that id
//! 3. is counted in `http_requests_total{method, route, status}`
//! 4. echoes the id back in the response header
//!
//! # Example
//!
//! ```ignore
//! let app = with_request_tracing(Router::new().route("/health", get(health)));
//! ```

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Add request ids, tracing spans and request metrics to a router.
pub fn with_request_tracing<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let header = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(header))
            .layer(middleware::from_fn(track_requests)),
    )
}

async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let response = next.run(request).await;

    metrics::counter!(
        "http_requests_total",
        "method" => method,
        "route" => route,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        with_request_tracing(Router::new().route("/test", get(|| async { "ok" })))
    }

    #[tokio::test]
    async fn test_request_id_generated_if_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();

        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("request id header should be present");
        assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_preserved_from_request() {
        let request = Request::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, "device-a-42")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        let echoed = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("request id header should be present")
            .to_str()
            .unwrap();
        assert_eq!(echoed, "device-a-42");
    }
}
