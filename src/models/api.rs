use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthenticatedIdentity, Principal};
use crate::pagination::Pageable;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// The caller as seen by the pipeline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    /// Realm that authenticated the credential
    pub realm: String,
    /// `user` or `service`
    pub kind: &'static str,
    pub name: String,
    pub personal: bool,
}

impl From<&AuthenticatedIdentity> for IdentityResponse {
    fn from(identity: &AuthenticatedIdentity) -> Self {
        let (kind, name) = match &identity.principal {
            Principal::User(user) => ("user", user.username.clone()),
            Principal::Service(service) => ("service", service.name.clone()),
        };

        Self {
            realm: identity.realm.clone(),
            kind,
            name,
            personal: identity.is_personal(),
        }
    }
}

/// Reporting period filter for event listings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// One page of events with the paging descriptor that produced it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    pub items: Vec<EventSummary>,
    pub pageable: Pageable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: Uuid,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Event submitted to the ingest endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEventRequest {
    pub event_type: String,
    /// Opaque event body
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Acknowledgment of an accepted event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEventResponse {
    pub accepted: bool,
    pub event_id: Uuid,
    pub project_id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// State of a licensed or feature-flagged capability.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    pub capability: String,
    pub enabled: bool,
}
