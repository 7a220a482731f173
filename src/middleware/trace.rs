//! W3C trace context propagation.
//!
//! An incoming `traceparent` header (`00-<trace id>-<parent span id>-<flags>`)
//! continues its trace with a fresh span id; anything else starts a new
//! trace. Each request runs inside an `http.request` span carrying the ids,
//! and the [`TraceContext`] is stored in both request and response
//! extensions so the recorder can correlate its log record. Span export is
//! left to whatever subscriber layer the binary installs.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;
use tracing::{Instrument, field, info_span};
use uuid::Uuid;

/// Header carrying the W3C trace context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const TRACE_ID_LEN: usize = 32;
const SPAN_ID_LEN: usize = 16;

/// Trace and span identifiers of the current exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    /// 32 lowercase hex characters
    pub trace_id: String,
    /// 16 lowercase hex characters, fresh for this request
    pub span_id: String,
    /// Span id of the caller when the trace was continued
    pub parent_span_id: Option<String>,
    pub sampled: bool,
}

impl TraceContext {
    /// Start a new trace.
    pub fn new_root() -> Self {
        Self {
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            parent_span_id: None,
            sampled: true,
        }
    }
}

pub fn generate_trace_id() -> String {
    format!("{:032x}", Uuid::new_v4().as_u128())
}

pub fn generate_span_id() -> String {
    format!("{:016x}", Uuid::new_v4().as_u64_pair().0)
}

fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_all_zero(value: &str) -> bool {
    value.bytes().all(|b| b == b'0')
}

/// Parse a `traceparent` value into `(trace_id, parent_span_id, sampled)`.
fn parse_traceparent(value: &str) -> Option<(&str, &str, bool)> {
    let mut parts = value.trim().split('-');
    let (Some(version), Some(trace_id), Some(parent_id), Some(flags), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };

    // Version ff is forbidden.
    if !is_lower_hex(version, 2) || version == "ff" {
        return None;
    }
    if !is_lower_hex(trace_id, TRACE_ID_LEN) || is_all_zero(trace_id) {
        return None;
    }
    if !is_lower_hex(parent_id, SPAN_ID_LEN) || is_all_zero(parent_id) {
        return None;
    }
    if !is_lower_hex(flags, 2) {
        return None;
    }

    let sampled = u8::from_str_radix(flags, 16).ok()? & 0x01 == 0x01;
    Some((trace_id, parent_id, sampled))
}

/// Continue the caller's trace if the headers carry a valid one.
pub fn extract_trace_context(headers: &HeaderMap) -> TraceContext {
    headers
        .get(TRACEPARENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_traceparent)
        .map(|(trace_id, parent_id, sampled)| TraceContext {
            trace_id: trace_id.to_string(),
            span_id: generate_span_id(),
            parent_span_id: Some(parent_id.to_string()),
            sampled,
        })
        .unwrap_or_else(TraceContext::new_root)
}

/// Middleware running the exchange inside an `http.request` span.
pub async fn propagate_trace_context(mut req: Request, next: Next) -> Response {
    let ctx = extract_trace_context(req.headers());
    let span = info_span!(
        "http.request",
        trace_id = %ctx.trace_id,
        span_id = %ctx.span_id,
        method = %req.method(),
        path = %req.uri().path(),
        status = field::Empty,
    );

    req.extensions_mut().insert(ctx.clone());
    let mut response = next.run(req).instrument(span.clone()).await;

    span.record("status", response.status().as_u16());
    response.extensions_mut().insert(ctx);
    response
}
