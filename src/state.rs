//! Shared application state for the pipeline's interceptors and handlers.
//!
//! Every collaborator sits behind an `Arc<dyn Trait>` so production wiring
//! and test doubles are swapped without touching the router. All components
//! are safe for concurrent use from any number of in-flight requests.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::auth::{Authenticator, CredentialClassifier, NativeRealm, RealmChain};
use crate::capability::{FeatureFlags, Licenser, StaticFeatureFlags, StaticLicenser};
use crate::config::Config;
use crate::middleware::request_log::{LogSink, TracingSink};
use crate::quota::{GovernorQuotaBackend, QuotaBackend};

/// Shared application state, cloned into every layer and handler.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    pub classifier: Arc<CredentialClassifier>,
    /// External authentication chain
    pub authenticator: Arc<dyn Authenticator>,
    /// Counter store behind the rate limit guard
    pub quota: Arc<dyn QuotaBackend>,
    pub feature_flags: Arc<dyn FeatureFlags>,
    pub licenser: Arc<dyn Licenser>,
    /// Destination of request/response log records
    pub log_sink: Arc<dyn LogSink>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Build state with the in-process collaborators described by `config`:
    /// a realm chain holding one native realm, a Governor quota backend,
    /// static capability sets and the tracing log sink.
    pub fn from_config(config: Config) -> Self {
        let mut realm = NativeRealm::new();
        for (username, password) in &config.basic_users {
            realm = realm.with_user(username, password);
        }
        for (token, username) in &config.personal_tokens {
            realm = realm.with_personal_token(token, username);
        }
        for (token, name) in &config.service_keys {
            realm = realm.with_service_key(token, name);
        }

        info!(
            users = config.basic_users.len(),
            personal_tokens = config.personal_tokens.len(),
            service_keys = config.service_keys.len(),
            "Native realm configured"
        );

        let chain = RealmChain::new().with_realm(Arc::new(realm));

        Self {
            classifier: Arc::new(CredentialClassifier::new(
                &config.api_key_prefix,
                &config.api_key_separator,
            )),
            authenticator: Arc::new(chain),
            quota: Arc::new(GovernorQuotaBackend::new()),
            feature_flags: Arc::new(StaticFeatureFlags::new(
                config.enabled_features.iter().copied(),
            )),
            licenser: Arc::new(StaticLicenser::new(
                config.license_entitlements.iter().copied(),
            )),
            log_sink: Arc::new(TracingSink),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Replace the authentication chain.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replace the quota backend (e.g. with a distributed store).
    pub fn with_quota_backend(mut self, quota: Arc<dyn QuotaBackend>) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_feature_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.feature_flags = flags;
        self
    }

    pub fn with_licenser(mut self, licenser: Arc<dyn Licenser>) -> Self {
        self.licenser = licenser;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::capability::{Entitlement, FeatureFlagKey};

    #[tokio::test]
    async fn test_from_config_wires_native_realm() {
        let config = Config {
            basic_users: vec![("alice".into(), "pw".into())],
            personal_tokens: vec![("CO.pat".into(), "alice".into())],
            ..Config::default()
        };
        let state = AppState::from_config(config);

        let identity = state
            .authenticator
            .authenticate(&Credential::ApiKey("CO.pat".into()))
            .await
            .unwrap();
        assert!(identity.is_personal());
    }

    #[test]
    fn test_from_config_wires_capabilities() {
        let config = Config {
            enabled_features: vec![FeatureFlagKey::Prometheus],
            license_entitlements: vec![Entitlement::PortalLinks],
            ..Config::default()
        };
        let state = AppState::from_config(config);

        assert!(state.feature_flags.can_access_feature(FeatureFlagKey::Prometheus));
        assert!(state.licenser.portal_links());
        assert!(!state.licenser.enterprise_sso());
    }

    #[test]
    fn test_classifier_uses_configured_prefix() {
        let config = Config {
            api_key_prefix: "cv".into(),
            api_key_separator: "_".into(),
            ..Config::default()
        };
        let state = AppState::from_config(config);

        assert_eq!(
            state.classifier.classify(Some("Bearer cv_abc.def.ghi")),
            Ok(Credential::ApiKey("cv_abc.def.ghi".into()))
        );
    }
}
