//! # Edge Pipeline
//!
//! The request-edge pipeline of an HTTP API: every interceptor that runs
//! before business logic, composed on axum/tower.
//!
//! - **Credential classification**: Basic, Bearer JWT, API key, opaque token
//! - **Rate limiting**: one shared quota bucket, RFC-style rate limit headers
//! - **Authentication gate**: delegates verification to a realm chain
//! - **Capability gates**: personal access token, feature flags, licenses
//! - **Pagination**: normalized cursor paging descriptor per request
//! - **Observability**: redacted request logs, trace context, ingest metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Recorder → Request ID → CORS → Headers → Trace → Rate Limit│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Auth → PAT / Feature / License gates → Pagination          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, identity, events, capabilities)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Collaborators (Authenticator, QuotaBackend, FeatureFlags,  │
//! │  Licenser, LogSink)                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edge_pipeline::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::from_config(config);
//!     let app = build_router(state)?;
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Security Configuration
//!
//! Seed the in-memory native realm:
//! ```bash
//! AUTH_BASIC_USERS=alice:secret AUTH_PERSONAL_TOKENS=CO.alice-pat=alice cargo run
//! ```
//!
//! Adjust rate limiting (requests per second, 0 disables):
//! ```bash
//! HTTP_API_RATE_LIMIT=10 cargo run
//! ```

pub mod auth;
pub mod capability;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod quota;
pub mod routes;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{EdgeError, EdgeResult};
pub use routes::build_router;
pub use state::AppState;
