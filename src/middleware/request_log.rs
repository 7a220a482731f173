//! Observability recorder: one structured, redacted log record per exchange.
//!
//! The recorder is the outermost layer. It captures the request fields
//! before calling inward, then wraps the response body in a [`TeeBody`]
//! that counts and snapshots bytes as the caller reads them. When the body
//! reaches end-of-stream the record is built, filtered by the skip
//! predicate and handed to the [`LogSink`].
//!
//! # Record Lifecycle
//!
//! ```text
//! Recording ──(end of stream)──► Flushed (emitted or skipped)
//!     │
//!     └──(body dropped early / body error)──► Flushed (nothing emitted)
//! ```
//!
//! The transition happens once. A client that disconnects before the body
//! completes produces no record. `HEAD` responses are never read by the
//! server, so their record is flushed when the body is dropped.
//!
//! # Redaction
//!
//! Header names are lower-cased. A header with one value is recorded as
//! that value; several values are recorded as `[a], [b]`. `authorization`,
//! `cookie` and `set-cookie` are replaced with `***`.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method, Request, Response};
use http_body::{Body as _, Frame, SizeHint};
use serde::Serialize;
use tower::{Layer, Service};
use tracing::{Level, error, info, warn};

use super::ip::remote_addr;
use super::request_id::REQUEST_ID_HEADER;
use super::trace::TraceContext;

/// Header names whose values never reach a log record.
pub const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "set-cookie"];

/// Replacement for redacted header values.
pub const REDACTION_MASK: &str = "***";

/// Response content types treated as static assets and never logged.
const SKIPPED_CONTENT_TYPES: [&str; 6] = [
    "application/javascript",
    "image",
    "font",
    "text/html",
    "text/javascript",
    "text/css",
];

/// Log severity for a response status.
pub fn status_level(status: u16) -> Level {
    match status {
        0 => Level::WARN,
        1..=399 => Level::INFO,
        400..=499 => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Flatten and redact a header map.
pub fn header_fields(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();

    for name in headers.keys() {
        let key = name.as_str().to_ascii_lowercase();
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();

        let value = match values.as_slice() {
            [] => continue,
            [single] => single.clone(),
            many => format!("[{}]", many.join("], [")),
        };

        let value = if REDACTED_HEADERS.contains(&key.as_str()) {
            REDACTION_MASK.to_string()
        } else {
            value
        };
        fields.insert(key, value);
    }

    fields
}

/// True when an exchange must not produce a log record: the URL contains a
/// skip path, or the response is a static asset.
pub fn should_skip_logging(
    request_url: &str,
    content_type: Option<&str>,
    skip_paths: &[String],
) -> bool {
    if skip_paths
        .iter()
        .any(|path| request_url.contains(path.as_str()))
    {
        return true;
    }

    content_type.is_some_and(|ct| SKIPPED_CONTENT_TYPES.iter().any(|s| ct.contains(s)))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFields {
    #[serde(rename = "requestURL")]
    pub request_url: String,
    pub request_method: String,
    pub request_path: String,
    #[serde(rename = "remoteIP")]
    pub remote_ip: String,
    pub proto: String,
    pub scheme: String,
    #[serde(rename = "x-request-id", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
}

impl RequestFields {
    fn from_request<B>(req: &Request<B>) -> Self {
        let scheme = req
            .uri()
            .scheme_str()
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
            })
            .unwrap_or("http")
            .to_string();
        let host = req
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| req.uri().authority().map(|a| a.as_str()))
            .unwrap_or_default();
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| req.uri().path());

        Self {
            request_url: format!("{scheme}://{host}{path_and_query}"),
            request_method: req.method().to_string(),
            request_path: req.uri().path().to_string(),
            remote_ip: remote_addr(req).into_owned(),
            proto: format!("{:?}", req.version()),
            scheme,
            request_id: None,
            trace_id: None,
            span_id: None,
            header: header_fields(req.headers()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFields {
    pub status: u16,
    pub bytes: u64,
    pub latency_ms: f64,
    pub body: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, String>,
}

/// One request/response exchange, ready for a sink.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub http_request: RequestFields,
    pub http_response: ResponseFields,
}

impl LogRecord {
    pub fn level(&self) -> Level {
        status_level(self.http_response.status)
    }
}

/// Destination of log records. Called at most once per exchange, from
/// whichever task polls the response body to completion.
pub trait LogSink: Send + Sync {
    fn emit(&self, record: LogRecord);
}

/// Emits each record as one `tracing` event at the mapped level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        let request_id = record.http_request.request_id.clone().unwrap_or_default();
        let fields = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => format!("{{\"serializationError\":\"{e}\"}}"),
        };
        let url = &record.http_request.request_url;

        match record.level() {
            Level::ERROR => error!(target: "http", request_id = %request_id, http = %fields, "{url}"),
            Level::WARN => warn!(target: "http", request_id = %request_id, http = %fields, "{url}"),
            _ => info!(target: "http", request_id = %request_id, http = %fields, "{url}"),
        }
    }
}

/// Recorder settings shared by every exchange.
struct RecorderConfig {
    sink: Arc<dyn LogSink>,
    skip_paths: Vec<String>,
    body_limit: usize,
}

/// Observability recorder layer for Tower middleware stack.
#[derive(Clone)]
pub struct RecorderLayer {
    config: Arc<RecorderConfig>,
}

impl RecorderLayer {
    /// * `skip_paths` - URL substrings whose exchanges are never logged
    /// * `body_limit` - maximum response bytes kept in the body snapshot
    pub fn new(sink: Arc<dyn LogSink>, skip_paths: Vec<String>, body_limit: usize) -> Self {
        Self {
            config: Arc::new(RecorderConfig {
                sink,
                skip_paths,
                body_limit,
            }),
        }
    }
}

impl<S> Layer<S> for RecorderLayer {
    type Service = RecorderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecorderService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Observability recorder service wrapper.
#[derive(Clone)]
pub struct RecorderService<S> {
    inner: S,
    config: Arc<RecorderConfig>,
}

impl<S> Service<Request<Body>> for RecorderService<S>
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
        let started = Instant::now();
        let flush_on_drop = req.method() == Method::HEAD;
        let mut request = RequestFields::from_request(&req);
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;
            let (parts, body) = response.into_parts();

            request.request_id = parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(ctx) = parts.extensions.get::<TraceContext>() {
                request.trace_id = Some(ctx.trace_id.clone());
                request.span_id = Some(ctx.span_id.clone());
            }

            let pending = PendingRecord {
                request,
                status: parts.status.as_u16(),
                content_type: parts
                    .headers
                    .get(CONTENT_TYPE)
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
                response_headers: header_fields(&parts.headers),
                started,
                bytes: 0,
                snapshot: Vec::new(),
            };

            let body = Body::new(TeeBody {
                inner: body,
                state: RecorderState::Recording(Box::new(pending)),
                flush_on_drop,
                config,
            });
            Ok(Response::from_parts(parts, body))
        })
    }
}

/// Everything known about an exchange while its body is in flight.
struct PendingRecord {
    request: RequestFields,
    status: u16,
    content_type: Option<String>,
    response_headers: BTreeMap<String, String>,
    started: Instant,
    bytes: u64,
    snapshot: Vec<u8>,
}

impl PendingRecord {
    fn observe(&mut self, data: &Bytes, limit: usize) {
        self.bytes += data.len() as u64;
        let room = limit.saturating_sub(self.snapshot.len());
        if room > 0 {
            let take = room.min(data.len());
            self.snapshot
                .extend_from_slice(data.get(..take).unwrap_or_default());
        }
    }

    fn into_record(self) -> LogRecord {
        LogRecord {
            http_request: self.request,
            http_response: ResponseFields {
                status: self.status,
                bytes: self.bytes,
                latency_ms: self.started.elapsed().as_secs_f64() * 1000.0,
                body: snapshot_text(self.snapshot, self.bytes),
                header: self.response_headers,
            },
        }
    }
}

/// Render the body snapshot. A character cut in half by the snapshot limit
/// is dropped instead of showing up as a replacement character.
fn snapshot_text(mut snapshot: Vec<u8>, bytes: u64) -> String {
    if bytes > snapshot.len() as u64
        && let Err(e) = std::str::from_utf8(&snapshot)
        && e.error_len().is_none()
    {
        snapshot.truncate(e.valid_up_to());
    }
    String::from_utf8_lossy(&snapshot).into_owned()
}

enum RecorderState {
    Recording(Box<PendingRecord>),
    Flushed,
}

/// Response body that tees what the caller reads into a [`PendingRecord`].
pub struct TeeBody {
    inner: Body,
    state: RecorderState,
    flush_on_drop: bool,
    config: Arc<RecorderConfig>,
}

impl TeeBody {
    /// Build and emit the record unless the skip predicate suppresses it.
    fn flush(&mut self) {
        let RecorderState::Recording(pending) =
            std::mem::replace(&mut self.state, RecorderState::Flushed)
        else {
            return;
        };

        if should_skip_logging(
            &pending.request.request_url,
            pending.content_type.as_deref(),
            &self.config.skip_paths,
        ) {
            return;
        }

        self.config.sink.emit(pending.into_record());
    }

    /// Give up on the record without emitting anything.
    fn abandon(&mut self) {
        self.state = RecorderState::Flushed;
    }
}

impl http_body::Body for TeeBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let (Some(data), RecorderState::Recording(pending)) =
                    (frame.data_ref(), &mut this.state)
                {
                    pending.observe(data, this.config.body_limit);
                }
                if this.inner.is_end_stream() {
                    this.flush();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                warn!(error = %e, "Response body failed, exchange not logged");
                this.abandon();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.flush();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TeeBody {
    fn drop(&mut self) {
        // Empty bodies and HEAD responses are never polled.
        if self.flush_on_drop || self.inner.is_end_stream() {
            self.flush();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::Router;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use tower::ServiceExt;

    #[derive(Default)]
    struct CapturingSink(Mutex<Vec<LogRecord>>);

    impl LogSink for CapturingSink {
        fn emit(&self, record: LogRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    impl CapturingSink {
        fn records(&self) -> Vec<LogRecord> {
            self.0.lock().unwrap().clone()
        }
    }

    fn app(sink: Arc<CapturingSink>, body_limit: usize) -> Router {
        Router::new()
            .route("/json", get(|| async { axum::Json(serde_json::json!({"ok": true})) }))
            .route(
                "/cookie",
                get(|| async {
                    (
                        [("set-cookie", "session=abc")],
                        axum::Json(serde_json::json!({"ok": true})),
                    )
                }),
            )
            .route(
                "/logo.png",
                get(|| async { ([(CONTENT_TYPE, "image/png")], vec![0u8; 16]) }),
            )
            .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
            .route(
                "/boom",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down").into_response() }),
            )
            .route("/big", get(|| async { "x".repeat(100) }))
            .route("/health", get(|| async { "ok" }))
            .layer(RecorderLayer::new(
                sink,
                vec!["/health".to_string()],
                body_limit,
            ))
    }

    async fn drive(app: Router, req: Request<Body>) -> Response<Body> {
        let response = app.oneshot(req).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        Response::from_parts(parts, Body::from(bytes))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(HOST, "edge.local")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_status_level_boundaries() {
        assert_eq!(status_level(0), Level::WARN);
        assert_eq!(status_level(201), Level::INFO);
        assert_eq!(status_level(399), Level::INFO);
        assert_eq!(status_level(400), Level::WARN);
        assert_eq!(status_level(404), Level::WARN);
        assert_eq!(status_level(499), Level::WARN);
        assert_eq!(status_level(500), Level::ERROR);
        assert_eq!(status_level(503), Level::ERROR);
    }

    #[test]
    fn test_header_fields_collapse_and_redact() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.append("accept", HeaderValue::from_static("text/plain"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        headers.append("cookie", HeaderValue::from_static("a=1"));
        headers.append("cookie", HeaderValue::from_static("b=2"));

        let fields = header_fields(&headers);
        assert_eq!(fields["content-type"], "application/json");
        assert_eq!(fields["accept"], "[text/plain], [application/json]");
        assert_eq!(fields["authorization"], REDACTION_MASK);
        assert_eq!(fields["cookie"], REDACTION_MASK);
    }

    #[test]
    fn test_skip_predicate() {
        let skip = vec!["/health".to_string()];
        assert!(should_skip_logging("http://h/health", None, &skip));
        assert!(should_skip_logging("http://h/api", Some("image/png"), &skip));
        assert!(should_skip_logging("http://h/app.css", Some("text/css; charset=utf-8"), &skip));
        assert!(should_skip_logging("http://h/", Some("font/woff2"), &skip));
        assert!(!should_skip_logging("http://h/api", Some("application/json"), &skip));
        assert!(!should_skip_logging("http://h/api", None, &[]));
    }

    #[tokio::test]
    async fn test_json_exchange_is_recorded() {
        let sink = Arc::new(CapturingSink::default());
        let response = drive(app(sink.clone(), 1024), get_req("/json?x=1")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.http_request.request_url, "http://edge.local/json?x=1");
        assert_eq!(record.http_request.request_method, "GET");
        assert_eq!(record.http_request.request_path, "/json");
        assert_eq!(record.http_request.proto, "HTTP/1.1");
        assert_eq!(record.http_request.remote_ip, "unknown");
        assert_eq!(record.http_response.status, 200);
        assert_eq!(record.http_response.body, r#"{"ok":true}"#);
        assert_eq!(record.http_response.bytes, 11);
        assert_eq!(record.level(), Level::INFO);
    }

    #[tokio::test]
    async fn test_set_cookie_is_masked() {
        let sink = Arc::new(CapturingSink::default());
        let response = drive(app(sink.clone(), 1024), get_req("/cookie")).await;
        assert_eq!(response.headers()["set-cookie"], "session=abc");

        let records = sink.records();
        assert_eq!(records[0].http_response.header["set-cookie"], "***");
    }

    #[tokio::test]
    async fn test_static_asset_is_not_recorded() {
        let sink = Arc::new(CapturingSink::default());
        let response = drive(app(sink.clone(), 1024), get_req("/logo.png")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_skip_path_is_not_recorded() {
        let sink = Arc::new(CapturingSink::default());
        drive(app(sink.clone(), 1024), get_req("/health")).await;
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_recorded_on_drop() {
        let sink = Arc::new(CapturingSink::default());
        let response = app(sink.clone(), 1024)
            .oneshot(get_req("/empty"))
            .await
            .unwrap();
        drop(response);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].http_response.status, 204);
        assert_eq!(records[0].http_response.bytes, 0);
    }

    #[tokio::test]
    async fn test_unread_body_is_not_recorded() {
        let sink = Arc::new(CapturingSink::default());
        let response = app(sink.clone(), 1024).oneshot(get_req("/json")).await.unwrap();
        drop(response);

        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_head_request_is_recorded() {
        let sink = Arc::new(CapturingSink::default());
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/json")
            .header(HOST, "edge.local")
            .body(Body::empty())
            .unwrap();
        let response = app(sink.clone(), 1024).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        drop(response);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].http_request.request_method, "HEAD");
        assert_eq!(records[0].http_response.status, 200);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_error_level() {
        let sink = Arc::new(CapturingSink::default());
        drive(app(sink.clone(), 1024), get_req("/boom")).await;

        let records = sink.records();
        assert_eq!(records[0].level(), Level::ERROR);
    }

    #[tokio::test]
    async fn test_snapshot_is_capped_but_bytes_are_not() {
        let sink = Arc::new(CapturingSink::default());
        let response = drive(app(sink.clone(), 10), get_req("/big")).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 100);

        let records = sink.records();
        assert_eq!(records[0].http_response.bytes, 100);
        assert_eq!(records[0].http_response.body, "x".repeat(10));
    }

    #[tokio::test]
    async fn test_snapshot_does_not_split_characters() {
        let sink = Arc::new(CapturingSink::default());
        let app = Router::new()
            .route("/accents", get(|| async { "éééé" }))
            .layer(RecorderLayer::new(sink.clone(), Vec::new(), 3));
        drive(app, get_req("/accents")).await;

        let records = sink.records();
        assert_eq!(records[0].http_response.bytes, 8);
        assert_eq!(records[0].http_response.body, "é");
    }

    #[test]
    fn test_snapshot_text_keeps_invalid_bytes_of_complete_body() {
        assert_eq!(snapshot_text(vec![0x61, 0xff], 2), "a\u{fffd}");
        assert_eq!(snapshot_text(vec![0x61, 0xc3], 2), "a\u{fffd}");
        assert_eq!(snapshot_text(vec![0x61, 0xc3], 5), "a");
    }

    #[test]
    fn test_record_serializes_wire_names() {
        let record = LogRecord {
            http_request: RequestFields {
                request_url: "http://h/a".into(),
                request_method: "GET".into(),
                request_path: "/a".into(),
                remote_ip: "127.0.0.1:1".into(),
                proto: "HTTP/1.1".into(),
                scheme: "http".into(),
                request_id: Some("r1".into()),
                trace_id: None,
                span_id: None,
                header: BTreeMap::new(),
            },
            http_response: ResponseFields {
                status: 200,
                bytes: 2,
                latency_ms: 1.5,
                body: "ok".into(),
                header: BTreeMap::new(),
            },
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["httpRequest"]["requestURL"], "http://h/a");
        assert_eq!(json["httpRequest"]["remoteIP"], "127.0.0.1:1");
        assert_eq!(json["httpRequest"]["x-request-id"], "r1");
        assert!(json["httpRequest"].get("traceId").is_none());
        assert_eq!(json["httpResponse"]["latencyMs"], 1.5);
    }
}
