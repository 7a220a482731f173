//! Authentication gate.
//!
//! # Flow
//!
//! ```text
//! Authorization header ─► CredentialClassifier ─► Authenticator ─► extensions
//!        │                       │ Err                  │ Err
//!        ▼                       ▼                      ▼
//!   (absent = malformed)   401 + classifier msg   401 "authorization failed"
//! ```
//!
//! Classifier failures describe the caller's own input and are echoed.
//! Authentication chain failures render a fixed message so the response
//! never reveals which part of a credential was wrong; the cause is logged.
//! A chain that cannot be consulted yields 500, and one that misses the
//! collaborator deadline yields 504.
//!
//! On success the [`AuthenticatedIdentity`] is stored in request extensions
//! and read by handlers through the [`AuthUser`] extractor.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request as AxumRequest};
use axum::http::request::Parts;
use axum::http::{Request, Response, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::timeout::{RequestTimeoutExt, with_deadline};
use crate::auth::{AuthError, AuthenticatedIdentity, Authenticator, CredentialClassifier};
use crate::error::EdgeError;
use crate::metrics;

/// Authentication layer for Tower middleware stack.
#[derive(Clone)]
pub struct RequireAuth {
    classifier: Arc<CredentialClassifier>,
    authenticator: Arc<dyn Authenticator>,
    /// Deadline for one chain call when the client sets none
    timeout: Duration,
}

impl RequireAuth {
    pub fn new(
        classifier: Arc<CredentialClassifier>,
        authenticator: Arc<dyn Authenticator>,
        timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            authenticator,
            timeout,
        }
    }
}

impl<S> Layer<S> for RequireAuth {
    type Service = RequireAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAuthService {
            inner,
            classifier: self.classifier.clone(),
            authenticator: self.authenticator.clone(),
            timeout: self.timeout,
        }
    }
}

/// Authentication service wrapper.
#[derive(Clone)]
pub struct RequireAuthService<S> {
    inner: S,
    classifier: Arc<CredentialClassifier>,
    authenticator: Arc<dyn Authenticator>,
    timeout: Duration,
}

impl<S> Service<Request<Body>> for RequireAuthService<S>
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
        let classified = self.classifier.classify(
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
        );
        let authenticator = self.authenticator.clone();
        let deadline = req.effective_timeout(self.timeout);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let credential = match classified {
                Ok(credential) => credential,
                Err(e) => {
                    metrics::record_auth_failure("invalid_credential");
                    warn!(path = %req.uri().path(), error = %e, "Rejected credential");
                    return Ok(EdgeError::from(e).into_response());
                }
            };

            let outcome = with_deadline(
                "authentication",
                deadline,
                authenticator.authenticate(&credential),
            )
            .await;

            match outcome {
                Ok(Ok(identity)) => {
                    debug!(
                        realm = %identity.realm,
                        credential = credential.kind(),
                        "Request authenticated"
                    );
                    req.extensions_mut().insert(identity);
                    inner.call(req).await
                }
                Ok(Err(AuthError::Unavailable(cause))) => {
                    metrics::record_auth_failure("backend_unavailable");
                    error!(error = %cause, "Authentication chain unavailable");
                    Ok(EdgeError::Internal(format!("authentication chain unavailable: {cause}"))
                        .into_response())
                }
                Ok(Err(e)) => {
                    metrics::record_auth_failure(failure_reason(&e));
                    warn!(
                        path = %req.uri().path(),
                        credential = credential.kind(),
                        error = %e,
                        "Authentication failed"
                    );
                    Ok(EdgeError::AuthenticationFailed.into_response())
                }
                Err(timeout) => {
                    metrics::record_auth_failure("timeout");
                    Ok(timeout.into_response())
                }
            }
        })
    }
}

fn failure_reason(err: &AuthError) -> &'static str {
    match err {
        AuthError::NoMatch(_) => "no_match",
        AuthError::Rejected { .. } => "rejected",
        AuthError::Unavailable(_) => "backend_unavailable",
    }
}

/// Forward only callers holding a personal access token: a human user
/// authenticated by the native realm. Anything else, including a request
/// that never passed [`RequireAuth`], is rejected with 400.
pub async fn require_personal_access_token(req: AxumRequest, next: Next) -> Response<Body> {
    match req.extensions().get::<AuthenticatedIdentity>() {
        Some(identity) if identity.is_personal() => next.run(req).await,
        Some(identity) => {
            debug!(realm = %identity.realm, "Identity is not a personal access token");
            EdgeError::InvalidTokenPrincipal.into_response()
        }
        None => EdgeError::InvalidTokenPrincipal.into_response(),
    }
}

/// Extractor for the identity attached by [`RequireAuth`].
///
/// Rejects with 401 when used on a route the gate does not cover.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthenticatedIdentity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = EdgeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(AuthUser)
            .ok_or(EdgeError::AuthenticationFailed)
    }
}
