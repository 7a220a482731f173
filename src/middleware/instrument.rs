//! Per-endpoint ingest instrumentation.
//!
//! Times the handler and records `edge_ingest_latency_seconds` and
//! `edge_ingest_total`, labelled by the `projectID` path parameter. Runs
//! independently of the recorder; a skipped log record still counts.
//! Must be installed with `route_layer` so the path parameters exist.

use std::time::Instant;

use axum::extract::rejection::RawPathParamsRejection;
use axum::extract::{RawPathParams, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::metrics;

/// Path parameter naming the ingesting project.
pub const PROJECT_PATH_PARAM: &str = "projectID";

/// `source` label for traffic arriving over HTTP.
pub const HTTP_SOURCE: &str = "http";

const UNKNOWN_PROJECT: &str = "unknown";

fn project_label(params: &Result<RawPathParams, RawPathParamsRejection>) -> String {
    params
        .as_ref()
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == PROJECT_PATH_PARAM)
                .map(|(_, value)| value.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_PROJECT.to_string())
}

pub async fn instrument_ingest(
    params: Result<RawPathParams, RawPathParamsRejection>,
    req: Request,
    next: Next,
) -> Response {
    let project = project_label(&params);
    let started = Instant::now();

    let response = next.run(req).await;

    metrics::record_ingest(HTTP_SOURCE, &project, started.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_handler_runs_under_instrumentation() {
        let app = Router::new().route(
            "/projects/{projectID}/events",
            post(|Path(project): Path<String>| async move { project })
                .route_layer(axum::middleware::from_fn(instrument_ingest)),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/projects/acme/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"acme");
    }

    #[tokio::test]
    async fn test_route_without_project_still_forwards() {
        let app = Router::new().route(
            "/ping",
            post(|| async { "pong" }).route_layer(axum::middleware::from_fn(instrument_ingest)),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
