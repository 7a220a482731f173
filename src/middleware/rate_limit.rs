//! Rate limit guard over an external quota backend.
//!
//! # Quota
//!
//! All HTTP API traffic shares one bucket, [`RATE_LIMIT_KEY`], over a fixed
//! 60 second window. The configured `HTTP_API_RATE_LIMIT` is a per-second
//! rate, so the window admits `rate * 60` requests. Counting happens in the
//! [`QuotaBackend`]; this layer only turns its answer into a forward or a
//! termination.
//!
//! # Response Headers
//!
//! On rejection (429):
//! - `X-RateLimit-Limit`: the scaled window limit
//! - `X-RateLimit-Remaining`: `0`
//! - `X-RateLimit-Reset`: fractional seconds until the bucket admits again
//! - `Retry-After`: Unix timestamp at which to retry
//!
//! A backend that cannot answer yields 500; one that does not answer within
//! the collaborator deadline yields 504. Neither reaches the handler.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{error, warn};

use super::timeout::{RequestTimeoutExt, with_deadline};
use crate::error::EdgeError;
use crate::metrics;
use crate::quota::{QuotaBackend, QuotaError, RateLimitDecision};

/// Bucket shared by all HTTP API requests.
pub const RATE_LIMIT_KEY: &str = "http-api";

/// Length of the quota window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Error type for rate limit layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Rate value cannot be zero.
    ZeroRate,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroRate => write!(
                f,
                "rate must be greater than 0; omit the layer to disable limiting"
            ),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Rate limiting layer for Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let layer = RateLimitLayer::new(backend, 10, Duration::from_secs(5))?; // 600 per minute
/// let app = Router::new()
///     .route("/api", get(handler))
///     .layer(layer);
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    backend: Arc<dyn QuotaBackend>,
    /// Requests admitted per window
    limit: u32,
    /// Deadline for one backend call when the client sets none
    timeout: Duration,
}

impl RateLimitLayer {
    /// Create a guard admitting `rate_per_second * 60` requests per window.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRate` if `rate_per_second` is 0.
    pub fn new(
        backend: Arc<dyn QuotaBackend>,
        rate_per_second: u32,
        timeout: Duration,
    ) -> Result<Self, RateLimitError> {
        if rate_per_second == 0 {
            return Err(RateLimitError::ZeroRate);
        }

        Ok(Self {
            backend,
            limit: rate_per_second.saturating_mul(60),
            timeout,
        })
    }

    /// Requests admitted per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            backend: self.backend.clone(),
            limit: self.limit,
            timeout: self.timeout,
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    backend: Arc<dyn QuotaBackend>,
    limit: u32,
    timeout: Duration,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let backend = self.backend.clone();
        let limit = self.limit;
        let deadline = req.effective_timeout(self.timeout);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let outcome = with_deadline(
                "quota backend",
                deadline,
                backend.allow_with_duration(RATE_LIMIT_KEY, limit, RATE_LIMIT_WINDOW),
            )
            .await;

            let rejection = match outcome {
                Ok(Ok(())) => return inner.call(req).await,
                Ok(Err(QuotaError::Exceeded { retry_after })) => {
                    metrics::record_rate_limit_rejection();
                    warn!(
                        path = %req.uri().path(),
                        limit,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                    EdgeError::RateLimitExceeded(RateLimitDecision::rejected(limit, retry_after))
                }
                Ok(Err(QuotaError::Unavailable(cause))) => {
                    error!(error = %cause, "Quota backend unavailable");
                    EdgeError::Internal(format!("quota backend unavailable: {cause}"))
                }
                Err(timeout) => timeout,
            };

            Ok(rejection.into_response())
        })
    }
}
