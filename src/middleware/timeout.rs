//! Deadlines for calls into external collaborators.
//!
//! The quota backend and the authentication chain are awaited under a
//! deadline. Clients may shorten or lengthen it within bounds via
//! `X-Request-Timeout` (milliseconds); otherwise the configured
//! `COLLABORATOR_TIMEOUT_MS` applies. Expiry terminates the exchange with
//! 504.

use std::future::Future;
use std::time::Duration;

use axum::http::Request;
use tracing::{debug, warn};

use crate::error::{EdgeError, EdgeResult};

/// Minimum honoured client timeout (100ms).
pub const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

/// Maximum honoured client timeout (5 minutes).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Header name for client-specified request timeout.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout";

/// Client-requested timeout, validated against the allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeout {
    pub duration: Duration,
}

impl RequestTimeout {
    /// Returns `None` if the value is outside the allowed range.
    pub fn from_millis(ms: u64) -> Option<Self> {
        (MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS)
            .contains(&ms)
            .then(|| Self {
                duration: Duration::from_millis(ms),
            })
    }
}

/// Extension trait resolving the deadline for a request.
pub trait RequestTimeoutExt {
    /// The client-specified timeout, or `default` when absent or invalid.
    fn effective_timeout(&self, default: Duration) -> Duration;
}

impl<B> RequestTimeoutExt for Request<B> {
    fn effective_timeout(&self, default: Duration) -> Duration {
        let Some(raw) = self
            .headers()
            .get(REQUEST_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return default;
        };

        match raw.trim().parse::<u64>().ok().and_then(RequestTimeout::from_millis) {
            Some(timeout) => timeout.duration,
            None => {
                debug!(value = raw, "Ignoring out-of-range X-Request-Timeout");
                default
            }
        }
    }
}

/// Await `fut` for at most `deadline`.
///
/// `operation` names the collaborator in logs and in the error.
pub async fn with_deadline<F, T>(operation: &str, deadline: Duration, fut: F) -> EdgeResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| {
        warn!(
            operation,
            timeout_ms = deadline.as_millis() as u64,
            "Collaborator call timed out"
        );
        EdgeError::OperationTimeout(operation.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(timeout: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder();
        if let Some(value) = timeout {
            builder = builder.header(REQUEST_TIMEOUT_HEADER, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_request_timeout_bounds() {
        assert!(RequestTimeout::from_millis(MIN_REQUEST_TIMEOUT_MS).is_some());
        assert!(RequestTimeout::from_millis(MAX_REQUEST_TIMEOUT_MS).is_some());
        assert!(RequestTimeout::from_millis(MIN_REQUEST_TIMEOUT_MS - 1).is_none());
        assert!(RequestTimeout::from_millis(MAX_REQUEST_TIMEOUT_MS + 1).is_none());
        assert!(RequestTimeout::from_millis(0).is_none());
    }

    #[test]
    fn test_effective_timeout() {
        let default = Duration::from_secs(5);
        assert_eq!(request(None).effective_timeout(default), default);
        assert_eq!(
            request(Some(" 250 ")).effective_timeout(default),
            Duration::from_millis(250)
        );
        assert_eq!(request(Some("10")).effective_timeout(default), default);
        assert_eq!(request(Some("soon")).effective_timeout(default), default);
    }

    #[tokio::test]
    async fn test_with_deadline_passes_through() {
        let value = with_deadline("quota", Duration::from_secs(1), async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_expires() {
        let err = with_deadline(
            "authentication",
            Duration::from_millis(100),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EdgeError::OperationTimeout(ref op) if op == "authentication"));
        assert_eq!(err.status_code(), axum::http::StatusCode::GATEWAY_TIMEOUT);
    }
}
