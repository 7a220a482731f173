//! Request ID propagation.
//!
//! An incoming `X-Request-ID` is kept; otherwise a UUIDv4 is generated. The
//! ID is written back onto the request headers, stored as a [`RequestId`]
//! extension for handlers, and echoed on the response. The recorder reads it
//! from the response headers when building its log record.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID for the current exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request ID layer for Tower middleware stack.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl RequestIdLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Request ID service wrapper.
#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let (request_id, header) = extract_or_generate_request_id(&req);

        req.headers_mut().insert(REQUEST_ID_HEADER, header.clone());
        req.extensions_mut().insert(RequestId(request_id.clone()));
        debug!(request_id = %request_id, "Processing request");

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, header);
            Ok(response)
        })
    }
}

/// Keep a usable incoming ID, or mint a new one.
fn extract_or_generate_request_id<B>(req: &Request<B>) -> (String, HeaderValue) {
    if let Some(header_value) = req.headers().get(REQUEST_ID_HEADER)
        && let Ok(value) = header_value.to_str()
        && !value.trim().is_empty()
    {
        return (value.to_string(), header_value.clone());
    }

    let generated = Uuid::new_v4().to_string();
    // A hyphenated UUID is always a valid header value.
    let header = HeaderValue::from_str(&generated)
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    (generated, header)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Extension;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn test_extract_existing_request_id() {
        let req = Request::builder()
            .header("x-request-id", "existing-id-123")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_or_generate_request_id(&req).0, "existing-id-123");
    }

    #[test]
    fn test_generate_new_request_id() {
        for req in [
            Request::builder().body(Body::empty()).unwrap(),
            Request::builder()
                .header("x-request-id", "  ")
                .body(Body::empty())
                .unwrap(),
        ] {
            let (id, header) = extract_or_generate_request_id(&req);
            assert!(Uuid::parse_str(&id).is_ok());
            assert_eq!(header, id.as_str());
        }
    }

    #[tokio::test]
    async fn test_request_id_reaches_handler_and_response() {
        let app = Router::new()
            .route(
                "/",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(RequestIdLayer::new());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("x-request-id", "corr-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "corr-1");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"corr-1");
    }
}
