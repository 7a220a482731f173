//! Application routing configuration with the interceptor pipeline.
//!
//! # Pipeline (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │    Recorder      │ ← one structured log record per exchange
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← propagates or generates X-Request-Id
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  CORS (dev only) │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Version / JSON   │ ← response headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     OPTIONS      │ ← answered with 200, never routed
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      Trace       │ ← traceparent, http.request span
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Rate Limit     │ ← 429 if exceeded
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Auth (/api/v1)   │ ← 401 if unauthenticated
//! └────────┬─────────┘
//!          ▼
//!   per-route gates, pagination, instrumentation
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health` - public
//! - `/api/v1/whoami`, `/api/v1/events` - any authenticated caller
//! - `/api/v1/tokens/personal` - personal access tokens only
//! - `/api/v1/projects/{projectID}/events` - instrumented ingest
//! - `/api/v1/sso/settings`, `/api/v1/portal/links` - license gated
//! - `/api/v1/retention` - feature gated

use axum::Router;
use axum::http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue,
};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::capability::FeatureFlagKey;
use crate::config::Config;
use crate::error::EdgeError;
use crate::handlers;
use crate::middleware::{
    GateLayer, RateLimitLayer, RecorderLayer, RequestIdLayer, RequireAuth, instrument_ingest,
    propagate_trace_context, require_personal_access_token, resolve_pagination,
};
use crate::state::AppState;

/// Build the application router with all routes and interceptors configured.
///
/// # Middleware Configuration
///
/// - **Rate Limiting**: Enabled if `http_api_rate_limit > 0`
/// - **CORS**: Development environment only
///
/// # Errors
///
/// Returns `EdgeError::ConfigError` if the version header or CORS origin
/// cannot be encoded, or the rate limit is invalid.
pub fn build_router(state: AppState) -> Result<Router, EdgeError> {
    let config = state.config.clone();

    let auth = RequireAuth::new(
        state.classifier.clone(),
        state.authenticator.clone(),
        config.collaborator_timeout,
    );

    let api = Router::new()
        .route("/whoami", get(handlers::whoami))
        .route(
            "/tokens/personal",
            get(handlers::personal_token_owner)
                .route_layer(from_fn(require_personal_access_token)),
        )
        .route(
            "/events",
            get(handlers::list_events).route_layer(from_fn(resolve_pagination)),
        )
        .route(
            "/projects/{projectID}/events",
            post(handlers::ingest_event).route_layer(from_fn(instrument_ingest)),
        )
        .route(
            "/sso/settings",
            get(handlers::sso_settings)
                .route_layer(GateLayer::enterprise_sso(state.licenser.clone())),
        )
        .route(
            "/portal/links",
            get(handlers::portal_links)
                .route_layer(GateLayer::portal_links(state.licenser.clone())),
        )
        .route(
            "/retention",
            get(handlers::retention_policy).route_layer(GateLayer::feature(
                state.feature_flags.clone(),
                FeatureFlagKey::RetentionPolicy,
            )),
        )
        .route_layer(auth);

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api);

    // =========================================================================
    // Apply Pipeline (applied innermost first)
    // =========================================================================

    if config.rate_limiting_enabled() {
        let layer = RateLimitLayer::new(
            state.quota.clone(),
            config.http_api_rate_limit,
            config.collaborator_timeout,
        )
        .map_err(|e| EdgeError::ConfigError(e.to_string()))?;
        info!(limit = layer.limit(), "Rate limiting enabled");
        router = router.layer(layer);
    } else {
        info!("Rate limiting disabled (HTTP_API_RATE_LIMIT=0)");
    }

    router = router.layer(from_fn(propagate_trace_context));

    router = router.layer(from_fn(answer_options));

    router = router.layer(SetResponseHeaderLayer::if_not_present(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    ));

    let (version_name, version_value) = version_header(&config)?;
    router = router.layer(SetResponseHeaderLayer::overriding(
        version_name,
        version_value,
    ));

    if config.is_development() {
        info!(origin = %config.cors_host, "Development CORS enabled");
        router = router.layer(build_cors_layer(&config.cors_host)?);
    }

    router = router.layer(RequestIdLayer::new());

    router = router.layer(RecorderLayer::new(
        state.log_sink.clone(),
        config.skip_log_paths.clone(),
        config.log_body_limit_bytes,
    ));

    Ok(router.with_state(state))
}

/// Answer every `OPTIONS` request with an empty 200. In development the CORS
/// layer has already answered real preflights by the time this runs.
async fn answer_options(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(req).await
}

fn version_header(config: &Config) -> Result<(HeaderName, HeaderValue), EdgeError> {
    let name = HeaderName::from_bytes(config.version_header.as_bytes())
        .map_err(|e| EdgeError::ConfigError(format!("VERSION_HEADER: {e}")))?;
    let value = HeaderValue::from_str(&config.api_version)
        .map_err(|e| EdgeError::ConfigError(format!("API_VERSION: {e}")))?;
    Ok((name, value))
}

/// Build the development CORS layer for a single allowed origin.
fn build_cors_layer(origin: &str) -> Result<CorsLayer, EdgeError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|e| EdgeError::ConfigError(format!("CORS_HOST: {e}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            CONTENT_LENGTH,
            ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            AUTHORIZATION,
        ]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use axum::body::Body;
    use tower::ServiceExt;

    use crate::config::Environment;

    #[test]
    fn test_build_cors_layer_valid_origin() {
        assert!(build_cors_layer("http://localhost:4200").is_ok());
    }

    #[test]
    fn test_build_cors_layer_rejects_invalid_origin() {
        assert!(matches!(
            build_cors_layer("bad\norigin"),
            Err(EdgeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_version_header_is_config_error() {
        let state = AppState::from_config(Config {
            version_header: "bad header".to_string(),
            ..Config::default()
        });
        assert!(matches!(build_router(state), Err(EdgeError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_cors_preflight_in_development() {
        let state = AppState::from_config(Config {
            environment: Environment::Development,
            ..Config::default()
        });
        let app = build_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/whoami")
                    .header("origin", "http://localhost:4200")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:4200"
        );
    }

    #[tokio::test]
    async fn test_options_answered_in_production() {
        let state = AppState::from_config(Config {
            http_api_rate_limit: 0,
            ..Config::default()
        });
        let app = build_router(state).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(
            !response
                .headers()
                .contains_key("access-control-allow-origin")
        );
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_options_on_unknown_path_is_answered() {
        let app = build_router(AppState::from_config(Config::default())).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/nowhere")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_cors_in_production() {
        let app = build_router(AppState::from_config(Config::default())).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:4200")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            !response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }
}
