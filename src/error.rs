use axum::http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::auth::CredentialError;
use crate::quota::RateLimitDecision;

/// Header carrying the effective quota for the window.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Header carrying the remaining quota for the window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Header carrying the seconds until the quota window resets.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Every way an interceptor can terminate an exchange.
///
/// # Client-visible messages
///
/// Credential shape errors are echoed verbatim because they describe the
/// caller's own input. Authentication chain failures, backend outages and
/// configuration problems render a fixed message; the detail is logged
/// server-side only.
#[derive(Error, Debug)]
pub enum EdgeError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("authorization failed")]
    AuthenticationFailed,

    #[error("exceeded rate limit")]
    RateLimitExceeded(RateLimitDecision),

    #[error("this feature is not enabled in this server")]
    FeatureDisabled,

    #[error("access to this resource requires a valid license")]
    LicenseRequired,

    #[error("unauthorized")]
    InvalidTokenPrincipal,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Operation timed out: {0}")]
    OperationTimeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EdgeError {
    /// HTTP status used when this error terminates an exchange.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EdgeError::Credential(_)
            | EdgeError::AuthenticationFailed
            | EdgeError::LicenseRequired => StatusCode::UNAUTHORIZED,
            EdgeError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            EdgeError::FeatureDisabled => StatusCode::FORBIDDEN,
            EdgeError::InvalidTokenPrincipal | EdgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EdgeError::OperationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EdgeError::Internal(_) | EdgeError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message rendered to the caller.
    fn public_message(&self) -> String {
        match self {
            EdgeError::BadRequest(msg) => msg.clone(),
            EdgeError::OperationTimeout(_) => "operation timed out, please try again".to_string(),
            EdgeError::Internal(_) | EdgeError::ConfigError(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Uniform error envelope for every terminated exchange.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status: false,
            message: message.into(),
            status_code: status.as_u16(),
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorResponse::new(self.public_message(), status);
        let mut response = (status, axum::Json(body)).into_response();

        if let EdgeError::RateLimitExceeded(decision) = &self {
            let headers = response.headers_mut();
            for (name, value) in [
                (X_RATELIMIT_LIMIT, decision.limit.to_string()),
                (X_RATELIMIT_REMAINING, decision.remaining.to_string()),
                (X_RATELIMIT_RESET, decision.reset_after_header()),
                (RETRY_AFTER, decision.retry_at.timestamp().to_string()),
            ] {
                if let Ok(value) = HeaderValue::from_str(&value) {
                    headers.insert(name, value);
                }
            }
        }

        response
    }
}

/// Convenience type alias for Results with EdgeError.
pub type EdgeResult<T> = Result<T, EdgeError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_credential_error_message_is_echoed() {
        let response = EdgeError::from(CredentialError::MalformedHeader).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["message"], "invalid header structure");
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["status"], false);
    }

    #[tokio::test]
    async fn test_internal_error_is_not_echoed() {
        let response =
            EdgeError::Internal("realm backend at 10.0.0.3 refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            EdgeError::AuthenticationFailed.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(EdgeError::FeatureDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            EdgeError::LicenseRequired.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            EdgeError::InvalidTokenPrincipal.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EdgeError::OperationTimeout("quota".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_rate_limit_response_carries_quota_headers() {
        let decision = RateLimitDecision::rejected(600, std::time::Duration::from_millis(12_300));
        let retry_at = decision.retry_at.timestamp().to_string();
        let response = EdgeError::RateLimitExceeded(decision).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["x-ratelimit-limit"], "600");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert_eq!(headers["x-ratelimit-reset"], "12.300000");
        assert_eq!(headers["retry-after"].to_str().unwrap(), retry_at);

        let body = body_json(response).await;
        assert_eq!(body["message"], "exceeded rate limit");
        assert_eq!(body["statusCode"], 429);
    }
}
