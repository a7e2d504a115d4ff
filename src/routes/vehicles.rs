use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{NewVehicle, Vehicle, VehicleChanges};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_mirrored: bool,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Vehicle>>, AppError> {
    let scope = auth.scope(&state, params.include_mirrored);
    Ok(Json(scope.access.vehicles))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<NewVehicle>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle = state.directory.create_vehicle(auth.write_tenant()?, req)?;
    Ok(Json(vehicle))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, AppError> {
    let scope = auth.scope(&state, true);
    scope
        .access
        .vehicles
        .into_iter()
        .find(|v| v.id == id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<VehicleChanges>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle = state
        .directory
        .update_vehicle(auth.write_tenant()?, id, req)?;
    Ok(Json(vehicle))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.directory.delete_vehicle(auth.write_tenant()?, id)?;
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

pub async fn by_plate(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(plate): Path<String>,
) -> Result<Json<Vehicle>, AppError> {
    let scope = auth.scope(&state, false);
    state
        .directory
        .vehicle_by_plate(scope.access.resolved_tenant_id, &plate)
        .filter(|v| scope.allows_vehicle(v.id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Vehicle not found".to_string()))
}
