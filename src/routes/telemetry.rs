use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::models::{Position, Trip};
use crate::pipeline::{self, LiveEvents};
use crate::state::SharedState;
use crate::telemetry;

/// Window used when the caller gives no `from`.
const DEFAULT_WINDOW_HOURS: i64 = 24;

#[derive(Deserialize)]
pub struct RangeParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_mirrored: bool,
}

impl RangeParams {
    fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
        let to = self.to.unwrap_or_else(Utc::now);
        let from = self
            .from
            .unwrap_or(to - TimeDelta::hours(DEFAULT_WINDOW_HOURS));
        if from > to {
            return Err(AppError::BadRequest("from must not be after to".to_string()));
        }
        Ok((from, to))
    }
}

#[derive(Serialize)]
pub struct DevicePosition {
    pub device_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub position: Position,
}

pub async fn latest_positions(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<DevicePosition>>, AppError> {
    let scope = auth.scope(&state, params.include_mirrored);
    let positions =
        telemetry::fetch_latest_positions(state.telemetry.as_ref(), &scope.accessible_device_ids)
            .await?;

    let positions = positions
        .into_iter()
        .filter_map(|position| {
            let device = scope.device_by_traccar_id(position.device_id)?;
            Some(DevicePosition {
                device_id: device.id,
                vehicle_id: device.vehicle_id,
                position,
            })
        })
        .collect();
    Ok(Json(positions))
}

pub async fn events(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<LiveEvents>, AppError> {
    let (from, to) = params.window()?;
    let limit = params
        .limit
        .unwrap_or(state.config.event_limit)
        .clamp(1, state.config.event_limit);

    let scope = auth.scope(&state, params.include_mirrored);
    let events =
        pipeline::live_events(&state, auth.alert_tenant(), &scope, from, to, limit).await?;
    Ok(Json(events))
}

pub async fn trips(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(device_id): Path<Uuid>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let (from, to) = params.window()?;
    let scope = auth.scope(&state, true);
    let device = scope
        .device(device_id)
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;
    let traccar_id = device.traccar_id.ok_or_else(|| {
        AppError::BadRequest("Device is not registered in the tracking backend".to_string())
    })?;

    let trips =
        telemetry::fetch_trips_by_device(state.telemetry.as_ref(), traccar_id, from, to).await?;
    Ok(Json(trips))
}
