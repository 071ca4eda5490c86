use axum::{Json, extract::State};
use common::service::HealthReport;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "health",
    summary = "Check repository access",
    description = "Probes the content repository with the configured credential. Needs no session \
        and never reveals the credential. Repeated calls with unchanged configuration return the \
        same result.",
    responses(
        (status = 200, description = "Probe result", body = HealthReport),
        (status = 429, description = "Remote rate limit (RATE_LIMITED)", body = ErrorBody),
        (status = 500, description = "Configuration or remote failure (CONFIGURATION_ERROR, REMOTE_API_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>, AppError> {
    Ok(Json(state.service.health().await?))
}
