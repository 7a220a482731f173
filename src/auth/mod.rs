//! Caller identity: credential classification and the authentication
//! boundary.
//!
//! The pipeline classifies credentials but never verifies them. Verification
//! is delegated to an [`Authenticator`], normally a [`RealmChain`] of
//! backends tried in order.

mod credential;
mod realm;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use credential::{
    Credential, CredentialClassifier, CredentialError, DEFAULT_API_KEY_PREFIX,
    DEFAULT_API_KEY_SEPARATOR, SCHEME_BASIC, SCHEME_BEARER,
};
pub use realm::{NativeRealm, Realm, RealmChain};

/// Name of the realm backed by the service's own user store.
pub const NATIVE_REALM_NAME: &str = "native_realm";

/// A human account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A non-human principal authenticated by API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePrincipal {
    pub key_id: String,
    pub name: String,
}

/// Who a credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Principal {
    User(User),
    Service(ServicePrincipal),
}

/// Result of a successful authentication, attached to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    /// Realm that accepted the credential.
    pub realm: String,
    pub principal: Principal,
}

impl AuthenticatedIdentity {
    /// True for a human user authenticated by the native realm.
    pub fn is_personal(&self) -> bool {
        self.realm == NATIVE_REALM_NAME && matches!(self.principal, Principal::User(_))
    }
}

/// Failures reported by the authentication chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No realm accepted the credential.
    #[error("no realm accepted the {0} credential")]
    NoMatch(&'static str),

    /// A realm recognised the caller but refused the credential.
    #[error("credential rejected by {realm}: {reason}")]
    Rejected { realm: String, reason: String },

    /// The chain (or a realm backend) could not be consulted.
    #[error("authentication backend unavailable: {0}")]
    Unavailable(String),
}

/// The external authentication chain.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &Credential)
    -> Result<AuthenticatedIdentity, AuthError>;
}
