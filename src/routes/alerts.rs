use axum::extract::{Path, Query, State};
use axum::Json;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Alert, AlertFilters, AlertResolution};
use crate::state::SharedState;

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(filters): Query<AlertFilters>,
) -> Result<Json<Vec<Alert>>, AppError> {
    Ok(Json(state.alerts.list_alerts(auth.alert_tenant(), &filters)))
}

/// `id` is the alert id or the id of the raw event it was created from.
pub async fn handle(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<AlertResolution>,
) -> Result<Json<Alert>, AppError> {
    state
        .alerts
        .handle_alert(auth.alert_tenant(), &id, req, auth.actor.id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Alert not found".to_string()))
}
