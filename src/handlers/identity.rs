use axum::Json;
use tracing::instrument;

use crate::middleware::AuthUser;
use crate::models::IdentityResponse;

/// Describe the authenticated caller.
#[instrument(skip_all, fields(realm = %identity.realm))]
pub async fn whoami(AuthUser(identity): AuthUser) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}

/// Same as [`whoami`], mounted behind the personal-access-token gate so
/// only human callers reach it.
#[instrument(skip_all, fields(realm = %identity.realm))]
pub async fn personal_token_owner(AuthUser(identity): AuthUser) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}
