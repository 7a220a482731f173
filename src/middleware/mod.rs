//! Request interceptors composing the edge pipeline.
//!
//! Each interceptor either forwards the exchange, possibly attaching a typed
//! request extension, or terminates it with an [`EdgeError`] response.
//!
//! # Composition (outermost first)
//!
//! ```text
//! Recorder → Request ID → CORS (dev) → version header → content-type
//!   → Trace → Rate Limit → [route] Auth → PAT / feature / license gates
//!   → Pagination → Ingest instrumentation → handler
//! ```
//!
//! | Interceptor | Terminates with |
//! |-------------|-----------------|
//! | Rate limit  | 429, 500, 504 |
//! | Auth        | 401, 500, 504 |
//! | PAT gate    | 400 |
//! | Feature     | 403 |
//! | License     | 401 |
//!
//! [`EdgeError`]: crate::error::EdgeError

pub mod auth;
pub mod gate;
pub mod instrument;
pub mod ip;
pub mod pagination;
pub mod rate_limit;
pub mod request_id;
pub mod request_log;
pub mod timeout;
pub mod trace;

pub use auth::{AuthUser, RequireAuth, require_personal_access_token};
pub use gate::GateLayer;
pub use instrument::instrument_ingest;
pub use ip::{UNKNOWN_IP, extract_client_ip, remote_addr};
pub use pagination::{Paging, resolve_pagination};
pub use rate_limit::{RateLimitError, RateLimitLayer};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer};
pub use request_log::{LogRecord, LogSink, RecorderLayer, TracingSink};
pub use timeout::{
    MAX_REQUEST_TIMEOUT_MS, MIN_REQUEST_TIMEOUT_MS, REQUEST_TIMEOUT_HEADER, RequestTimeout,
    RequestTimeoutExt, with_deadline,
};
pub use trace::{TRACEPARENT_HEADER, TraceContext, propagate_trace_context};
