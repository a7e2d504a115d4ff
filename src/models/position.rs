use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::{ALARM, Attributes};

/// Raw GPS fix as stored by the tracking backend. `speed` is in knots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub device_id: i64,
    pub protocol: Option<String>,
    pub fix_time: DateTime<Utc>,
    pub server_time: DateTime<Utc>,
    pub device_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub course: f64,
    pub address: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Raw event row from the tracking backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: i64,
    pub event_type: String,
    pub event_time: Option<DateTime<Utc>>,
    pub device_id: i64,
    pub position_id: Option<i64>,
    pub geofence_id: Option<i64>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl TelemetryEvent {
    /// The protocol-level code: the alarm name for `alarm` events, else the event type.
    pub fn raw_code(&self) -> &str {
        if self.event_type == "alarm" {
            if let Some(alarm) = self.attributes.get_str(ALARM) {
                return alarm;
            }
        }
        &self.event_type
    }
}
