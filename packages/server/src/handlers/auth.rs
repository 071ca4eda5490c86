use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::Identity;
use crate::models::auth::MeResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Describe the signed-in caller",
    description = "Returns the login carried by the session token and whether the access policy \
        admits it. Does not contact the content repository.",
    responses(
        (status = 200, description = "Session", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, identity))]
pub async fn me(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, AppError> {
    let session = state.service.session(identity.login())?;
    Ok(Json(MeResponse::from(session)))
}
