use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event_config::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Handled,
}

/// Operator's record of how an alert was dealt with. Stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertResolution {
    #[serde(default)]
    pub resolved: bool,
    pub action_taken: Option<String>,
    pub root_cause: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Id of the raw event in the tracking backend; unique per tenant.
    pub event_id: i64,
    pub protocol: String,
    pub event_type: String,
    pub label: String,
    pub severity: Severity,
    pub category: String,
    pub requires_handling: bool,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub device_id: Option<Uuid>,
    pub traccar_device_id: Option<i64>,
    pub vehicle_id: Option<Uuid>,
    pub position_id: Option<i64>,
    pub handled_by: Option<Uuid>,
    pub handled_at: Option<DateTime<Utc>>,
    pub resolution: Option<AlertResolution>,
}

/// Directory linkage captured when the alert is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertLinkage {
    pub device_id: Option<Uuid>,
    pub traccar_device_id: Option<i64>,
    pub vehicle_id: Option<Uuid>,
}

/// Conjunctive filters; `None` matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilters {
    pub status: Option<AlertStatus>,
    pub vehicle_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AlertFilters {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.status.is_none_or(|s| alert.status == s)
            && self.vehicle_id.is_none_or(|v| alert.vehicle_id == Some(v))
            && self.device_id.is_none_or(|d| alert.device_id == Some(d))
            && self.severity.is_none_or(|s| alert.severity == s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| alert.category.eq_ignore_ascii_case(c))
            && self.from.is_none_or(|from| alert.created_at >= from)
            && self.to.is_none_or(|to| alert.created_at <= to)
    }
}
