use chrono::{DateTime, Utc};
use serde::Serialize;

use super::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

impl From<&Position> for TripPoint {
    fn from(p: &Position) -> Self {
        Self {
            time: p.fix_time,
            latitude: p.latitude,
            longitude: p.longitude,
            address: p.address.clone(),
        }
    }
}

/// One contiguous movement episode, derived on demand and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub device_id: i64,
    pub start: TripPoint,
    pub end: TripPoint,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub position_count: usize,
}
