//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with defaults
//! suitable for local runs. In production, configure via environment
//! variables or a `.env` file.
//!
//! # Identity
//!
//! - `API_KEY_PREFIX` / `API_KEY_SEPARATOR`: marker that identifies API keys
//!   among bearer tokens (default: `CO` + `.`)
//! - `AUTH_BASIC_USERS`: `user:password` pairs for the native realm
//! - `AUTH_PERSONAL_TOKENS`: `token=user` pairs (personal access tokens)
//! - `AUTH_SERVICE_KEYS`: `token=name` pairs (service principals)
//!
//! # Quota
//!
//! - `HTTP_API_RATE_LIMIT`: requests per second; the guard admits
//!   `value * 60` requests per 60 second window (default: 50, 0 disables)

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

use crate::capability::{Entitlement, FeatureFlagKey};
use crate::error::{EdgeError, EdgeResult};

/// Deployment environment. CORS is only installed in development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 5005)
    pub port: u16,

    /// Deployment environment (default: production)
    pub environment: Environment,

    /// Origin allowed by the development CORS layer
    pub cors_host: String,

    /// Name of the header carrying the API version on every response
    pub version_header: String,

    /// Value written into `version_header`
    pub api_version: String,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Requests per second (default: 50). Set to 0 to disable the guard.
    pub http_api_rate_limit: u32,

    // =========================================================================
    // Identity Configuration
    // =========================================================================
    pub api_key_prefix: String,
    pub api_key_separator: String,

    /// `(username, password)` pairs for the native realm
    pub basic_users: Vec<(String, String)>,

    /// `(token, username)` pairs
    pub personal_tokens: Vec<(String, String)>,

    /// `(token, service name)` pairs
    pub service_keys: Vec<(String, String)>,

    /// Deadline for a single call to the quota or authentication backend
    pub collaborator_timeout: Duration,

    // =========================================================================
    // Capability Configuration
    // =========================================================================
    pub enabled_features: Vec<FeatureFlagKey>,
    pub license_entitlements: Vec<Entitlement>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// URL substrings whose exchanges are never logged
    pub skip_log_paths: Vec<String>,

    /// Maximum response bytes kept in a log record's body snapshot
    pub log_body_limit_bytes: usize,

    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns `EdgeError::ConfigError` if any value fails to parse or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> EdgeResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or(defaults.host),
            port: Self::parse_env("PORT", defaults.port)?,
            environment: Self::parse_env("ENVIRONMENT", defaults.environment)?,
            cors_host: env::var("CORS_HOST").unwrap_or(defaults.cors_host),
            version_header: env::var("VERSION_HEADER").unwrap_or(defaults.version_header),
            api_version: env::var("API_VERSION").unwrap_or(defaults.api_version),

            // Rate limiting
            http_api_rate_limit: Self::parse_env(
                "HTTP_API_RATE_LIMIT",
                defaults.http_api_rate_limit,
            )?,

            // Identity
            api_key_prefix: env::var("API_KEY_PREFIX").unwrap_or(defaults.api_key_prefix),
            api_key_separator: env::var("API_KEY_SEPARATOR")
                .unwrap_or(defaults.api_key_separator),
            basic_users: parse_pairs(
                "AUTH_BASIC_USERS",
                &env_or_empty("AUTH_BASIC_USERS"),
                |e| e.split_once(':'),
            )?,
            personal_tokens: parse_pairs(
                "AUTH_PERSONAL_TOKENS",
                &env_or_empty("AUTH_PERSONAL_TOKENS"),
                |e| e.rsplit_once('='),
            )?,
            service_keys: parse_pairs(
                "AUTH_SERVICE_KEYS",
                &env_or_empty("AUTH_SERVICE_KEYS"),
                |e| e.rsplit_once('='),
            )?,
            collaborator_timeout: Duration::from_millis(Self::parse_env(
                "COLLABORATOR_TIMEOUT_MS",
                5000,
            )?),

            // Capabilities
            enabled_features: parse_list("ENABLED_FEATURES", &env_or_empty("ENABLED_FEATURES"))?,
            license_entitlements: parse_list(
                "LICENSE_ENTITLEMENTS",
                &env_or_empty("LICENSE_ENTITLEMENTS"),
            )?,

            // Observability
            skip_log_paths: env::var("SKIP_LOG_PATHS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.skip_log_paths),
            log_body_limit_bytes: Self::parse_env(
                "LOG_BODY_LIMIT_BYTES",
                defaults.log_body_limit_bytes,
            )?,
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: Self::parse_env("LOG_FORMAT", defaults.log_format)?,
            metrics_port: Self::parse_env("METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `EdgeError::ConfigError` if validation fails.
    pub fn validate(&self) -> EdgeResult<()> {
        HeaderName::from_bytes(self.version_header.as_bytes()).map_err(|e| {
            EdgeError::ConfigError(format!(
                "VERSION_HEADER ({}) is not a valid header name: {e}",
                self.version_header
            ))
        })?;

        if self.api_key_prefix.is_empty() {
            return Err(EdgeError::ConfigError(
                "API_KEY_PREFIX must not be empty".to_string(),
            ));
        }

        if self.collaborator_timeout.is_zero() {
            return Err(EdgeError::ConfigError(
                "COLLABORATOR_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Check if the rate limit guard is installed.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.http_api_rate_limit > 0
    }

    /// Requests admitted per window: the per-second rate times sixty.
    pub fn rate_limit_per_window(&self) -> u32 {
        self.http_api_rate_limit.saturating_mul(60)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> EdgeResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| EdgeError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

fn env_or_empty(name: &str) -> String {
    env::var(name).unwrap_or_default()
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse every entry of a comma-separated list.
fn parse_list<T>(name: &str, raw: &str) -> EdgeResult<Vec<T>>
where
    T: FromStr<Err = String>,
{
    split_list(raw)
        .iter()
        .map(|entry| {
            entry
                .parse()
                .map_err(|e| EdgeError::ConfigError(format!("Invalid {name}: {e}")))
        })
        .collect()
}

/// Parse a list of pairs using `split` to cut each entry in two.
///
/// Passwords may contain `:` so users split at the first colon; tokens may
/// carry base64 padding so they split at the last `=`.
fn parse_pairs<F>(name: &str, raw: &str, split: F) -> EdgeResult<Vec<(String, String)>>
where
    F: Fn(&str) -> Option<(&str, &str)>,
{
    split_list(raw)
        .iter()
        .map(|entry| match split(entry) {
            Some((left, right)) if !left.is_empty() && !right.is_empty() => {
                Ok((left.to_string(), right.to_string()))
            }
            _ => Err(EdgeError::ConfigError(format!(
                "Invalid {name}: malformed entry"
            ))),
        })
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5005,
            environment: Environment::Production,
            cors_host: "http://localhost:4200".to_string(),
            version_header: "X-Edge-Version".to_string(),
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            http_api_rate_limit: 50,
            api_key_prefix: crate::auth::DEFAULT_API_KEY_PREFIX.to_string(),
            api_key_separator: crate::auth::DEFAULT_API_KEY_SEPARATOR.to_string(),
            basic_users: vec![],
            personal_tokens: vec![],
            service_keys: vec![],
            collaborator_timeout: Duration::from_secs(5),
            enabled_features: vec![],
            license_entitlements: vec![],
            skip_log_paths: vec!["/health".to_string(), "/metrics".to_string()],
            log_body_limit_bytes: 64 * 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: 9090,
        }
    }
}
