//! Credential classification from `Authorization` header values.
//!
//! Pure parsing, no I/O. The header must hold exactly two tokens separated by
//! a single space: `<scheme> <payload>`.
//!
//! # Payload Shape Precedence (`Bearer` scheme)
//!
//! ```text
//! payload starts with "<prefix><separator>"  → Credential::ApiKey
//! payload has exactly three '.' segments     → Credential::Jwt
//! anything else                               → Credential::BearerToken
//! ```
//!
//! The prefix check runs first, so an API key that happens to contain two
//! dots (`CO.abc.def`) is still an API key.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Scheme carrying a username/password pair.
pub const SCHEME_BASIC: &str = "BASIC";

/// Scheme carrying an API key, JWT or opaque token.
pub const SCHEME_BEARER: &str = "BEARER";

/// Default well-known API key prefix.
pub const DEFAULT_API_KEY_PREFIX: &str = "CO";

/// Default separator between the API key prefix and the key body.
pub const DEFAULT_API_KEY_SEPARATOR: &str = ".";

/// Input-shape failures. Messages are safe to echo to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid header structure")]
    MalformedHeader,

    #[error("{0}")]
    InvalidCredentials(&'static str),

    #[error("empty api key or token")]
    EmptyCredential,

    #[error("unknown credential type: {0}")]
    UnknownCredentialType(String),
}

/// A credential as presented by the caller. Built per request, never stored.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Basic { username: String, password: String },
    ApiKey(String),
    BearerToken(String),
    Jwt(String),
}

impl Credential {
    /// Short name of the variant, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Basic { .. } => "basic",
            Credential::ApiKey(_) => "api_key",
            Credential::BearerToken(_) => "token",
            Credential::Jwt(_) => "jwt",
        }
    }
}

// Secrets never reach Debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credential::BearerToken(_) => f.write_str("BearerToken(***)"),
            Credential::Jwt(_) => f.write_str("Jwt(***)"),
        }
    }
}

/// Parses `Authorization` header values into [`Credential`]s.
#[derive(Debug, Clone)]
pub struct CredentialClassifier {
    api_key_marker: String,
}

impl CredentialClassifier {
    /// Create a classifier recognising API keys that start with
    /// `prefix` immediately followed by `separator`.
    pub fn new(prefix: &str, separator: &str) -> Self {
        Self {
            api_key_marker: format!("{prefix}{separator}"),
        }
    }

    /// Classify a raw header value. `None` (header absent) is malformed.
    pub fn classify(&self, header: Option<&str>) -> Result<Credential, CredentialError> {
        let value = header.unwrap_or_default();
        let mut parts = value.split(' ');

        let (Some(scheme), Some(payload), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CredentialError::MalformedHeader);
        };

        let scheme = scheme.to_ascii_uppercase();
        match scheme.as_str() {
            SCHEME_BASIC => decode_basic(payload),
            SCHEME_BEARER => self.classify_token(payload),
            _ => Err(CredentialError::UnknownCredentialType(scheme)),
        }
    }

    fn classify_token(&self, payload: &str) -> Result<Credential, CredentialError> {
        if payload.trim().is_empty() {
            return Err(CredentialError::EmptyCredential);
        }

        if payload.starts_with(&self.api_key_marker) {
            return Ok(Credential::ApiKey(payload.to_string()));
        }

        if payload.split('.').count() == 3 {
            return Ok(Credential::Jwt(payload.to_string()));
        }

        Ok(Credential::BearerToken(payload.to_string()))
    }
}

impl Default for CredentialClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_API_KEY_PREFIX, DEFAULT_API_KEY_SEPARATOR)
    }
}

fn decode_basic(payload: &str) -> Result<Credential, CredentialError> {
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| CredentialError::InvalidCredentials("invalid credentials"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| CredentialError::InvalidCredentials("invalid credentials"))?;

    let mut parts = decoded.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(username), Some(password), None) => Ok(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(CredentialError::InvalidCredentials(
            "invalid basic credentials",
        )),
    }
}
