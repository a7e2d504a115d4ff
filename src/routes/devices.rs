use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Device, DeviceChanges, NewDevice};
use crate::state::SharedState;

use super::vehicles::ListParams;

#[derive(Deserialize)]
pub struct LinkDevice {
    pub vehicle_id: Uuid,
}

/// Devices on the accessible vehicles, plus the tenant's own unlinked stock.
pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Device>>, AppError> {
    let scope = auth.scope(&state, params.include_mirrored);
    let with_stock = auth.sees_unlinked_stock(&scope);
    let mut devices = scope.devices;

    if with_stock {
        devices.extend(
            state
                .directory
                .list_devices(scope.access.resolved_tenant_id)
                .into_iter()
                .filter(|d| d.vehicle_id.is_none()),
        );
    }
    Ok(Json(devices))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<NewDevice>,
) -> Result<Json<Device>, AppError> {
    let device = state.directory.create_device(auth.write_tenant()?, req)?;
    Ok(Json(device))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Device>, AppError> {
    let scope = auth.scope(&state, true);
    if let Some(device) = scope.device(id) {
        return Ok(Json(device.clone()));
    }

    // Unlinked devices are only visible to their owner.
    Some(scope.access.resolved_tenant_id)
        .filter(|_| auth.sees_unlinked_stock(&scope))
        .and_then(|tenant| state.directory.device_scoped(tenant, id))
        .filter(|d| d.vehicle_id.is_none())
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DeviceChanges>,
) -> Result<Json<Device>, AppError> {
    let device = state
        .directory
        .update_device(auth.write_tenant()?, id, req)?;
    Ok(Json(device))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.directory.delete_device(auth.write_tenant()?, id)?;
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn link(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LinkDevice>,
) -> Result<Json<Device>, AppError> {
    let device = state
        .directory
        .link_device(auth.write_tenant()?, id, req.vehicle_id)?;
    Ok(Json(device))
}

pub async fn unlink(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Device>, AppError> {
    let device = state.directory.unlink_device(auth.write_tenant()?, id)?;
    Ok(Json(device))
}

#[derive(Deserialize)]
pub struct LookupParams {
    pub unique_id: Option<String>,
    pub traccar_id: Option<i64>,
}

/// Find one of the caller's devices by hardware id or tracking-backend id.
pub async fn lookup(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Device>, AppError> {
    let scope = auth.scope(&state, true);
    let device = match (params.unique_id.as_deref(), params.traccar_id) {
        (Some(unique_id), _) => state.directory.device_by_unique_id(unique_id),
        (None, Some(traccar_id)) => state.directory.device_by_traccar_id(traccar_id),
        (None, None) => {
            return Err(AppError::BadRequest(
                "unique_id or traccar_id is required".to_string(),
            ));
        }
    };

    device
        .filter(|d| match d.vehicle_id {
            Some(_) => scope.device(d.id).is_some(),
            None => {
                d.tenant_id == scope.access.resolved_tenant_id && auth.sees_unlinked_stock(&scope)
            }
        })
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))
}
