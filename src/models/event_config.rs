use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" | "low" => Some(Severity::Info),
            "warning" | "medium" => Some(Severity::Warning),
            "critical" | "high" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Tenant overlay for one protocol event code. Present fields override the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfigEntry {
    pub code: String,
    pub display_name: Option<String>,
    pub severity: Option<Severity>,
    pub active: Option<bool>,
    pub category: Option<String>,
    pub requires_handling: Option<bool>,
    /// Auto-registered for a code the protocol catalog does not know.
    #[serde(default)]
    pub unmapped: bool,
    pub updated_at: DateTime<Utc>,
}

/// All overlay entries of one tenant for one protocol, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantEventConfig {
    pub tenant_id: Uuid,
    pub protocol: String,
    pub entries: Vec<EventConfigEntry>,
}

/// Bulk edit from a tenant configuration screen.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfigUpdate {
    pub code: String,
    pub display_name: Option<String>,
    pub severity: Option<Severity>,
    pub active: Option<bool>,
    pub category: Option<String>,
    pub requires_handling: Option<bool>,
}

/// Outcome of running a raw event code through the catalog and tenant overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub id: String,
    pub protocol: String,
    pub label: String,
    pub severity: Severity,
    pub active: bool,
    pub category: String,
    pub requires_handling: bool,
    pub is_mapped: bool,
}

/// Effective configuration row shown on configuration screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventConfigView {
    pub code: String,
    pub default_label: Option<String>,
    pub label: String,
    pub severity: Severity,
    pub active: bool,
    pub category: String,
    pub requires_handling: bool,
    pub is_mapped: bool,
}
