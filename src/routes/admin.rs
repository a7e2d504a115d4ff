use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{ClientType, TenantProfile};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct PutTenant {
    pub name: String,
    pub client_type: ClientType,
}

pub async fn list_tenants(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<TenantProfile>>, AppError> {
    auth.require_admin()?;
    Ok(Json(state.tenants.list()))
}

/// Create or replace a tenant profile. The client type decides receiver behaviour.
pub async fn put_tenant(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PutTenant>,
) -> Result<Json<TenantProfile>, AppError> {
    auth.require_admin()?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let created_at = state
        .tenants
        .get(id)
        .map_or_else(Utc::now, |existing| existing.created_at);
    let profile = state.tenants.upsert(TenantProfile {
        id,
        name: name.to_string(),
        client_type: req.client_type,
        created_at,
    })?;

    tracing::info!("Tenant {} saved as {:?}", profile.id, profile.client_type);
    Ok(Json(profile))
}
