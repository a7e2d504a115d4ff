use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::attributes::Attributes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Hardware identifier (IMEI or serial), globally unique ignoring case.
    pub unique_id: String,
    /// Numeric id of the device in the tracking backend.
    pub traccar_id: Option<i64>,
    pub name: Option<String>,
    pub vehicle_id: Option<Uuid>,
    pub chip_id: Option<Uuid>,
    #[serde(default)]
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    pub fn protocol(&self) -> Option<&str> {
        self.attributes.protocol()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDevice {
    pub unique_id: String,
    pub traccar_id: Option<i64>,
    pub name: Option<String>,
    pub chip_id: Option<Uuid>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Partial device update. For the nullable ids, a missing field keeps the
/// current value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceChanges {
    pub unique_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub traccar_id: Option<Option<i64>>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub chip_id: Option<Option<Uuid>>,
    pub attributes: Option<Attributes>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub fn normalize_unique_id(unique_id: &str) -> String {
    unique_id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_ids_clear_and_missing_ids_keep() {
        let changes: DeviceChanges =
            serde_json::from_str(r#"{ "traccar_id": null, "name": "Spare" }"#).unwrap();
        assert_eq!(changes.traccar_id, Some(None));
        assert_eq!(changes.chip_id, None);

        let changes: DeviceChanges = serde_json::from_str(r#"{ "traccar_id": 42 }"#).unwrap();
        assert_eq!(changes.traccar_id, Some(Some(42)));
    }
}
