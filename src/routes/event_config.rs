use axum::extract::{Path, State};
use axum::Json;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{EventConfigUpdate, EventConfigView};
use crate::state::SharedState;

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(protocol): Path<String>,
) -> Result<Json<Vec<EventConfigView>>, AppError> {
    let config = state
        .event_config
        .get_event_config(auth.alert_tenant(), &protocol);
    Ok(Json(config))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(protocol): Path<String>,
    Json(req): Json<Vec<EventConfigUpdate>>,
) -> Result<Json<Vec<EventConfigView>>, AppError> {
    if req.iter().any(|u| u.code.trim().is_empty()) {
        return Err(AppError::BadRequest("Every entry needs a code".to_string()));
    }
    let config = state
        .event_config
        .update_event_config(auth.alert_tenant(), &protocol, req)?;
    Ok(Json(config))
}
