//! Telemetry Store Gateway: read access to the external tracking database.
//!
//! Callers only ever pass tracking-backend device ids that came out of an
//! `AccessScope`, so every query here is already tenant-filtered.

pub mod dialect;
pub mod sql;
pub mod trips;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Position, TelemetryEvent, Trip};

pub use dialect::Dialect;
pub use sql::SqlTelemetryGateway;
pub use trips::reconstruct_trips;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Backend not configured, unreachable, or too slow to answer.
    #[error("Tracking backend unavailable: {0}")]
    Unavailable(String),
    #[error("Tracking backend query failed: {0}")]
    Query(String),
    #[error("Unexpected data from tracking backend: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for TelemetryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => TelemetryError::Unavailable(e.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => TelemetryError::Decode(e.to_string()),
            _ => TelemetryError::Query(e.to_string()),
        }
    }
}

#[async_trait]
pub trait TelemetryGateway: Send + Sync {
    /// Most recent position of each device that has one.
    async fn latest_positions(&self, device_ids: &[i64]) -> Result<Vec<Position>, TelemetryError>;

    /// Positions of one device in `[from, to]`, oldest first.
    async fn positions(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, TelemetryError>;

    /// Up to `limit` events of the given devices in `[from, to]`, newest first.
    async fn events(
        &self,
        device_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TelemetryEvent>, TelemetryError>;
}

/// Used when no tracking database is configured.
pub struct UnavailableGateway;

#[async_trait]
impl TelemetryGateway for UnavailableGateway {
    async fn latest_positions(&self, _: &[i64]) -> Result<Vec<Position>, TelemetryError> {
        Err(not_configured())
    }

    async fn positions(
        &self,
        _: i64,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<Position>, TelemetryError> {
        Err(not_configured())
    }

    async fn events(
        &self,
        _: &[i64],
        _: DateTime<Utc>,
        _: DateTime<Utc>,
        _: i64,
    ) -> Result<Vec<TelemetryEvent>, TelemetryError> {
        Err(not_configured())
    }
}

fn not_configured() -> TelemetryError {
    TelemetryError::Unavailable("TRACCAR_DATABASE_URL is not configured".to_string())
}

/// Latest positions for the accessible devices. An empty device list never reaches the backend.
pub async fn fetch_latest_positions(
    gateway: &dyn TelemetryGateway,
    device_ids: &[i64],
) -> Result<Vec<Position>, TelemetryError> {
    if device_ids.is_empty() {
        return Ok(Vec::new());
    }
    gateway.latest_positions(device_ids).await
}

pub async fn fetch_events(
    gateway: &dyn TelemetryGateway,
    device_ids: &[i64],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TelemetryEvent>, TelemetryError> {
    if device_ids.is_empty() || limit <= 0 {
        return Ok(Vec::new());
    }
    gateway.events(device_ids, from, to, limit).await
}

/// Trips of one device over `[from, to]`.
pub async fn fetch_trips_by_device(
    gateway: &dyn TelemetryGateway,
    device_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Trip>, TelemetryError> {
    let mut positions = gateway.positions(device_id, from, to).await?;
    positions.sort_by_key(|p| (p.fix_time, p.id));
    Ok(reconstruct_trips(device_id, &positions))
}
