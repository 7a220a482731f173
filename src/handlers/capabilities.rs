//! Endpoints behind license and feature gates.
//!
//! Reaching a handler here means its gate passed; the body only reports the
//! capability that was checked.

use axum::Json;
use tracing::instrument;

use crate::capability::{Entitlement, FeatureFlagKey};
use crate::models::CapabilityStatus;

fn enabled(capability: impl ToString) -> Json<CapabilityStatus> {
    Json(CapabilityStatus {
        capability: capability.to_string(),
        enabled: true,
    })
}

/// Behind the enterprise SSO license gate.
#[instrument]
pub async fn sso_settings() -> Json<CapabilityStatus> {
    enabled(Entitlement::EnterpriseSso)
}

/// Behind the portal-links license gate.
#[instrument]
pub async fn portal_links() -> Json<CapabilityStatus> {
    enabled(Entitlement::PortalLinks)
}

/// Behind the retention-policy feature flag.
#[instrument]
pub async fn retention_policy() -> Json<CapabilityStatus> {
    enabled(FeatureFlagKey::RetentionPolicy)
}
