//! Event endpoints.
//!
//! Storage is out of scope: listings are always empty and ingested events
//! are acknowledged and logged, not persisted. The handlers exist to drive
//! the pagination resolver, the period check and ingest instrumentation.

use axum::{Extension, Json};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{EdgeError, EdgeResult};
use crate::middleware::{AuthUser, Paging, RequestId};
use crate::models::{EventPage, IngestEventRequest, IngestEventResponse, PeriodQuery};
use crate::validation::{ensure_period, validate_event_type, validate_project_id};

/// List events for a reporting period, one page at a time.
#[instrument(skip_all, fields(per_page = pageable.per_page))]
pub async fn list_events(
    Paging(pageable): Paging,
    period: Result<Query<PeriodQuery>, QueryRejection>,
) -> EdgeResult<Json<EventPage>> {
    let Query(period) = period.map_err(|e| EdgeError::BadRequest(e.body_text()))?;

    if let (Some(start), Some(end)) = (period.start_date, period.end_date) {
        ensure_period(start, end)?;
    }

    Ok(Json(EventPage {
        items: Vec::new(),
        pageable,
        start_date: period.start_date,
        end_date: period.end_date,
    }))
}

/// Accept one event for a project. The acknowledgment carries the request
/// ID so producers can correlate it with the edge log.
#[instrument(skip_all, fields(project_id = %project_id))]
pub async fn ingest_event(
    AuthUser(identity): AuthUser,
    request_id: Option<Extension<RequestId>>,
    Path(project_id): Path<String>,
    body: Result<Json<IngestEventRequest>, JsonRejection>,
) -> EdgeResult<(StatusCode, Json<IngestEventResponse>)> {
    validate_project_id(&project_id)?;
    let Json(request) = body.map_err(|e| EdgeError::BadRequest(e.body_text()))?;
    validate_event_type(&request.event_type)?;

    let event_id = Uuid::new_v4();
    let request_id = request_id.map(|Extension(id)| id.as_str().to_owned());
    info!(
        event_id = %event_id,
        request_id = request_id.as_deref().unwrap_or_default(),
        event_type = %request.event_type,
        realm = %identity.realm,
        "Event accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestEventResponse {
            accepted: true,
            event_id,
            project_id,
            event_type: request.event_type,
            received_at: Utc::now(),
            request_id,
        }),
    ))
}
