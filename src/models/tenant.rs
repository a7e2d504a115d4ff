use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    #[default]
    Fleet,
    Logistics,
    Rental,
    RiskManagement,
    Insurer,
    MonitoringCenter,
}

impl ClientType {
    /// Receivers see only what active mirrors grant them, never their own fleet.
    pub fn is_receiver(&self) -> bool {
        matches!(
            self,
            ClientType::RiskManagement | ClientType::Insurer | ClientType::MonitoringCenter
        )
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "logistics" => ClientType::Logistics,
            "rental" => ClientType::Rental,
            "risk_management" | "gerenciadora" => ClientType::RiskManagement,
            "insurer" | "seguradora" => ClientType::Insurer,
            "monitoring_center" => ClientType::MonitoringCenter,
            _ => ClientType::Fleet,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub id: Uuid,
    pub name: String,
    pub client_type: ClientType,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_types() {
        assert!(ClientType::parse("Risk Management").is_receiver());
        assert!(ClientType::parse("insurer").is_receiver());
        assert!(ClientType::parse("monitoring-center").is_receiver());
        assert!(!ClientType::parse("fleet").is_receiver());
        assert!(!ClientType::parse("something-new").is_receiver());
    }
}
