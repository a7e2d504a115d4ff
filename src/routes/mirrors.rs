use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Mirror, NewMirror};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct MirrorList {
    /// Grants this tenant has given.
    pub owned: Vec<Mirror>,
    /// Grants other tenants have given this tenant.
    pub received: Vec<Mirror>,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<MirrorList>, AppError> {
    let tenant_id = auth.write_tenant()?;
    Ok(Json(MirrorList {
        owned: state.mirrors.list_by_owner(tenant_id),
        received: state.mirrors.list_targeting(tenant_id),
    }))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<NewMirror>,
) -> Result<Json<Mirror>, AppError> {
    let mirror = state
        .mirrors
        .create(auth.write_tenant()?, req, &state.directory)?;
    Ok(Json(mirror))
}

pub async fn revoke(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Mirror>, AppError> {
    let mirror = state.mirrors.revoke(auth.write_tenant()?, id)?;
    tracing::info!("Mirror {} revoked by {}", mirror.id, auth.actor.id);
    Ok(Json(mirror))
}
