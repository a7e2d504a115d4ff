use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Inactive => "inactive",
            VehicleStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => VehicleStatus::Inactive,
            "maintenance" => VehicleStatus::Maintenance,
            _ => VehicleStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plate: String,
    pub model: String,
    pub brand: Option<String>,
    pub vehicle_type: String,
    pub status: VehicleStatus,
    pub device_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVehicle {
    pub plate: String,
    pub model: String,
    pub brand: Option<String>,
    pub vehicle_type: String,
    #[serde(default)]
    pub status: VehicleStatus,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleChanges {
    pub plate: Option<String>,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub vehicle_type: Option<String>,
    pub status: Option<VehicleStatus>,
}

/// Case-insensitive form of a plate used for uniqueness checks.
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_lowercase()
}
