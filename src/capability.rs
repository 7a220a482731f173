//! Capability providers consulted by the feature and license gates.
//!
//! Flag storage and license validation live outside this crate; the gates
//! only ask yes/no questions through [`FeatureFlags`] and [`Licenser`]. The
//! static implementations here are driven by configuration.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Feature keys that can be toggled per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlagKey {
    Prometheus,
    FullTextSearch,
    RetentionPolicy,
    ReadReplicas,
    CircuitBreaker,
}

impl FeatureFlagKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFlagKey::Prometheus => "prometheus",
            FeatureFlagKey::FullTextSearch => "full-text-search",
            FeatureFlagKey::RetentionPolicy => "retention-policy",
            FeatureFlagKey::ReadReplicas => "read-replicas",
            FeatureFlagKey::CircuitBreaker => "circuit-breaker",
        }
    }
}

impl fmt::Display for FeatureFlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureFlagKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prometheus" => Ok(FeatureFlagKey::Prometheus),
            "full-text-search" => Ok(FeatureFlagKey::FullTextSearch),
            "retention-policy" => Ok(FeatureFlagKey::RetentionPolicy),
            "read-replicas" => Ok(FeatureFlagKey::ReadReplicas),
            "circuit-breaker" => Ok(FeatureFlagKey::CircuitBreaker),
            other => Err(format!("unknown feature flag: {other}")),
        }
    }
}

/// Answers whether a feature is enabled on this server.
pub trait FeatureFlags: Send + Sync {
    fn can_access_feature(&self, key: FeatureFlagKey) -> bool;
}

/// License entitlements checked by gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entitlement {
    EnterpriseSso,
    PortalLinks,
}

impl Entitlement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entitlement::EnterpriseSso => "enterprise_sso",
            Entitlement::PortalLinks => "portal_links",
        }
    }
}

impl fmt::Display for Entitlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entitlement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enterprise_sso" => Ok(Entitlement::EnterpriseSso),
            "portal_links" => Ok(Entitlement::PortalLinks),
            other => Err(format!("unknown license entitlement: {other}")),
        }
    }
}

/// Answers license entitlement questions.
pub trait Licenser: Send + Sync {
    fn enterprise_sso(&self) -> bool;
    fn portal_links(&self) -> bool;

    fn allows(&self, entitlement: Entitlement) -> bool {
        match entitlement {
            Entitlement::EnterpriseSso => self.enterprise_sso(),
            Entitlement::PortalLinks => self.portal_links(),
        }
    }
}

/// Feature flags fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticFeatureFlags {
    enabled: HashSet<FeatureFlagKey>,
}

impl StaticFeatureFlags {
    pub fn new(enabled: impl IntoIterator<Item = FeatureFlagKey>) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
        }
    }
}

impl FeatureFlags for StaticFeatureFlags {
    fn can_access_feature(&self, key: FeatureFlagKey) -> bool {
        self.enabled.contains(&key)
    }
}

/// License entitlements fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticLicenser {
    entitlements: HashSet<Entitlement>,
}

impl StaticLicenser {
    pub fn new(entitlements: impl IntoIterator<Item = Entitlement>) -> Self {
        Self {
            entitlements: entitlements.into_iter().collect(),
        }
    }
}

impl Licenser for StaticLicenser {
    fn enterprise_sso(&self) -> bool {
        self.entitlements.contains(&Entitlement::EnterpriseSso)
    }

    fn portal_links(&self) -> bool {
        self.entitlements.contains(&Entitlement::PortalLinks)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_flag_parse_and_display() {
        let key: FeatureFlagKey = " Full-Text-Search ".parse().unwrap();
        assert_eq!(key, FeatureFlagKey::FullTextSearch);
        assert_eq!(key.to_string(), "full-text-search");
        assert!("teleport".parse::<FeatureFlagKey>().is_err());
    }

    #[test]
    fn test_static_feature_flags() {
        let flags = StaticFeatureFlags::new([FeatureFlagKey::Prometheus]);
        assert!(flags.can_access_feature(FeatureFlagKey::Prometheus));
        assert!(!flags.can_access_feature(FeatureFlagKey::ReadReplicas));
    }

    #[test]
    fn test_static_licenser() {
        let licenser = StaticLicenser::new(["portal_links".parse().unwrap()]);
        assert!(licenser.portal_links());
        assert!(!licenser.enterprise_sso());
        assert!(licenser.allows(Entitlement::PortalLinks));
        assert!(!licenser.allows(Entitlement::EnterpriseSso));
    }
}
