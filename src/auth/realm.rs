//! Realm chain and the in-memory native realm.

use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use super::{
    AuthError, AuthenticatedIdentity, Authenticator, Credential, NATIVE_REALM_NAME, Principal,
    ServicePrincipal, User,
};

/// One authentication backend in a [`RealmChain`].
#[async_trait]
pub trait Realm: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `Ok(None)` when the realm does not handle this kind of
    /// credential, so the chain moves on.
    async fn authenticate(&self, credential: &Credential) -> Result<Option<Principal>, AuthError>;
}

/// Ordered set of realms; the first realm to accept a credential wins.
#[derive(Clone, Default)]
pub struct RealmChain {
    realms: Vec<Arc<dyn Realm>>,
}

impl RealmChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a realm to the end of the chain.
    pub fn with_realm(mut self, realm: Arc<dyn Realm>) -> Self {
        self.realms.push(realm);
        self
    }

    pub fn len(&self) -> usize {
        self.realms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }
}

#[async_trait]
impl Authenticator for RealmChain {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        if self.realms.is_empty() {
            return Err(AuthError::Unavailable("realm chain is empty".to_string()));
        }

        let mut last_error = None;
        for realm in &self.realms {
            match realm.authenticate(credential).await {
                Ok(Some(principal)) => {
                    return Ok(AuthenticatedIdentity {
                        realm: realm.name().to_string(),
                        principal,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(realm = realm.name(), error = %e, "Realm refused credential");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(AuthError::NoMatch(credential.kind())))
    }
}

/// In-memory native realm: basic-auth users, personal access tokens and
/// service API keys. Secrets are compared in constant time.
#[derive(Default)]
pub struct NativeRealm {
    users: Vec<(User, String)>,
    personal_tokens: Vec<(String, User)>,
    service_keys: Vec<(String, ServicePrincipal)>,
}

impl NativeRealm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user that may authenticate with basic credentials.
    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        let user = self.user_named(username);
        self.users.push((user, password.to_string()));
        self
    }

    /// Register a personal access token owned by `username`.
    pub fn with_personal_token(mut self, token: &str, username: &str) -> Self {
        let user = self.user_named(username);
        self.personal_tokens.push((token.to_string(), user));
        self
    }

    /// Register an API key belonging to a service principal.
    pub fn with_service_key(mut self, token: &str, name: &str) -> Self {
        let principal = ServicePrincipal {
            key_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.service_keys.push((token.to_string(), principal));
        self
    }

    fn user_named(&self, username: &str) -> User {
        self.users
            .iter()
            .map(|(user, _)| user)
            .chain(self.personal_tokens.iter().map(|(_, user)| user))
            .find(|user| user.username == username)
            .cloned()
            .unwrap_or_else(|| User {
                id: Uuid::new_v4().to_string(),
                username: username.to_string(),
            })
    }

    fn rejected(reason: &str) -> AuthError {
        AuthError::Rejected {
            realm: NATIVE_REALM_NAME.to_string(),
            reason: reason.to_string(),
        }
    }

    fn lookup_token(&self, token: &str) -> Option<Principal> {
        // Scan every entry so lookup time does not depend on where a match sits.
        let mut found = None;
        for (candidate, user) in &self.personal_tokens {
            if constant_time_eq(candidate, token) && found.is_none() {
                found = Some(Principal::User(user.clone()));
            }
        }
        for (candidate, principal) in &self.service_keys {
            if constant_time_eq(candidate, token) && found.is_none() {
                found = Some(Principal::Service(principal.clone()));
            }
        }
        found
    }
}

#[async_trait]
impl Realm for NativeRealm {
    fn name(&self) -> &str {
        NATIVE_REALM_NAME
    }

    async fn authenticate(&self, credential: &Credential) -> Result<Option<Principal>, AuthError> {
        match credential {
            Credential::Basic { username, password } => self
                .users
                .iter()
                .find(|(user, _)| user.username == *username)
                .filter(|(_, expected)| constant_time_eq(expected, password))
                .map(|(user, _)| Some(Principal::User(user.clone())))
                .ok_or_else(|| Self::rejected("invalid username or password")),
            Credential::ApiKey(token) => self
                .lookup_token(token)
                .map(Some)
                .ok_or_else(|| Self::rejected("unknown api key")),
            Credential::BearerToken(_) | Credential::Jwt(_) => Ok(None),
        }
    }
}

/// Perform constant-time comparison of two strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
