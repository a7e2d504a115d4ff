//! Alert Lifecycle Service.
//!
//! Alerts are partitioned by tenant and persisted as one snapshot that is
//! rewritten in full on every mutation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Alert, AlertFilters, AlertLinkage, AlertResolution, AlertStatus, ClassifiedEvent,
    TelemetryEvent,
};
use crate::snapshot::{SnapshotError, SnapshotFile};

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Default, Serialize, Deserialize)]
struct AlertBook {
    tenants: HashMap<Uuid, Vec<Alert>>,
}

pub struct AlertStore {
    book: RwLock<AlertBook>,
    snapshot: SnapshotFile,
}

impl AlertStore {
    pub fn open(data_dir: &Path) -> Result<Self, SnapshotError> {
        let snapshot = SnapshotFile::new(data_dir, "alerts");
        let book: AlertBook = snapshot.load()?.unwrap_or_default();

        Ok(Self {
            book: RwLock::new(book),
            snapshot,
        })
    }

    /// Create a pending alert for a classified event, or return the one already
    /// stored for the same raw event. Returns `None` when the event is inactive
    /// or does not require handling.
    pub fn upsert_alert_from_event(
        &self,
        tenant_id: Uuid,
        event: &TelemetryEvent,
        classified: &ClassifiedEvent,
        linkage: AlertLinkage,
    ) -> Result<Option<Alert>, AlertError> {
        if !classified.active || !classified.requires_handling {
            return Ok(None);
        }

        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let alerts = book.tenants.entry(tenant_id).or_default();
        if let Some(existing) = alerts.iter().find(|a| a.event_id == event.id) {
            return Ok(Some(existing.clone()));
        }

        let alert = Alert {
            id: Uuid::now_v7(),
            tenant_id,
            event_id: event.id,
            protocol: classified.protocol.clone(),
            event_type: classified.id.clone(),
            label: classified.label.clone(),
            severity: classified.severity,
            category: classified.category.clone(),
            requires_handling: classified.requires_handling,
            status: AlertStatus::Pending,
            created_at: event.event_time.unwrap_or_else(Utc::now),
            device_id: linkage.device_id,
            traccar_device_id: linkage.traccar_device_id.or(Some(event.device_id)),
            vehicle_id: linkage.vehicle_id,
            position_id: event.position_id,
            handled_by: None,
            handled_at: None,
            resolution: None,
        };
        alerts.push(alert.clone());

        if let Err(e) = self.snapshot.write(&*book) {
            if let Some(alerts) = book.tenants.get_mut(&tenant_id) {
                alerts.retain(|a| a.id != alert.id);
            }
            return Err(e.into());
        }

        tracing::info!(
            "Alert {} created for event {} ({}/{})",
            alert.id,
            alert.event_id,
            alert.protocol,
            alert.event_type
        );
        Ok(Some(alert))
    }

    /// Mark an alert handled. `alert_ref` is either the alert id or the raw event id.
    /// An alert that is already handled is returned unchanged.
    pub fn handle_alert(
        &self,
        tenant_id: Uuid,
        alert_ref: &str,
        resolution: AlertResolution,
        handled_by: Uuid,
    ) -> Result<Option<Alert>, AlertError> {
        let alert_ref = alert_ref.trim();
        if alert_ref.is_empty() {
            return Err(AlertError::Validation("Alert id is required".to_string()));
        }
        let by_id = alert_ref.parse::<Uuid>().ok();
        let by_event = alert_ref.parse::<i64>().ok();
        if by_id.is_none() && by_event.is_none() {
            return Ok(None);
        }

        let mut book = self.book.write().unwrap_or_else(PoisonError::into_inner);
        let Some(alert) = book.tenants.get_mut(&tenant_id).and_then(|alerts| {
            alerts
                .iter_mut()
                .find(|a| Some(a.id) == by_id || Some(a.event_id) == by_event)
        }) else {
            return Ok(None);
        };

        if alert.status == AlertStatus::Handled {
            return Ok(Some(alert.clone()));
        }

        let before = alert.clone();
        alert.status = AlertStatus::Handled;
        alert.handled_by = Some(handled_by);
        alert.handled_at = Some(Utc::now());
        alert.resolution = Some(resolution);
        let handled = alert.clone();

        if let Err(e) = self.snapshot.write(&*book) {
            if let Some(alert) = book
                .tenants
                .get_mut(&tenant_id)
                .and_then(|alerts| alerts.iter_mut().find(|a| a.id == before.id))
            {
                *alert = before;
            }
            return Err(e.into());
        }

        tracing::info!("Alert {} handled by {}", handled.id, handled_by);
        Ok(Some(handled))
    }

    /// Newest first.
    pub fn list_alerts(&self, tenant_id: Uuid, filters: &AlertFilters) -> Vec<Alert> {
        let book = self.book.read().unwrap_or_else(PoisonError::into_inner);
        let mut alerts: Vec<Alert> = book
            .tenants
            .get(&tenant_id)
            .map(|alerts| {
                alerts
                    .iter()
                    .filter(|a| filters.matches(a))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, Severity};
    use tempfile::TempDir;
    use chrono::{DateTime, TimeDelta};

    fn store() -> (AlertStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (AlertStore::open(dir.path()).unwrap(), dir)
    }

    fn event(id: i64, at: Option<DateTime<Utc>>) -> TelemetryEvent {
        TelemetryEvent {
            id,
            event_type: "alarm".to_string(),
            event_time: at,
            device_id: 11,
            position_id: Some(1000 + id),
            geofence_id: None,
            attributes: Attributes::new(),
        }
    }

    fn classified(severity: Severity, category: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            id: "sos".to_string(),
            protocol: "gt06".to_string(),
            label: "SOS".to_string(),
            severity,
            active: true,
            category: category.to_string(),
            requires_handling: true,
            is_mapped: true,
        }
    }

    #[test]
    fn upsert_is_idempotent_per_event() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();
        let at = Utc::now() - TimeDelta::minutes(5);
        let c = classified(Severity::Critical, "Security");

        let first = store
            .upsert_alert_from_event(tenant, &event(1, Some(at)), &c, AlertLinkage::default())
            .unwrap()
            .unwrap();
        let second = store
            .upsert_alert_from_event(tenant, &event(1, Some(at)), &c, AlertLinkage::default())
            .unwrap()
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.created_at, at);
        assert_eq!(first.traccar_device_id, Some(11));
        assert_eq!(store.list_alerts(tenant, &AlertFilters::default()).len(), 1);
    }

    #[test]
    fn inactive_or_informational_events_do_not_alert() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();

        let mut inactive = classified(Severity::Critical, "Security");
        inactive.active = false;
        let mut no_handling = classified(Severity::Info, "Logistics");
        no_handling.requires_handling = false;

        for c in [inactive, no_handling] {
            let result = store
                .upsert_alert_from_event(tenant, &event(2, None), &c, AlertLinkage::default())
                .unwrap();
            assert!(result.is_none());
        }
        assert!(store.list_alerts(tenant, &AlertFilters::default()).is_empty());
    }

    #[test]
    fn existing_alert_keeps_its_creation_snapshot() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();
        store
            .upsert_alert_from_event(
                tenant,
                &event(3, None),
                &classified(Severity::Critical, "Security"),
                AlertLinkage::default(),
            )
            .unwrap();

        let mut reclassified = classified(Severity::Info, "Logistics");
        reclassified.label = "Renamed".to_string();
        let again = store
            .upsert_alert_from_event(tenant, &event(3, None), &reclassified, AlertLinkage::default())
            .unwrap()
            .unwrap();

        let handled = store
            .handle_alert(tenant, "3", AlertResolution::default(), Uuid::now_v7())
            .unwrap()
            .unwrap();

        for alert in [again, handled] {
            assert_eq!(alert.label, "SOS");
            assert_eq!(alert.severity, Severity::Critical);
            assert_eq!(alert.category, "Security");
        }
    }

    #[test]
    fn handle_by_alert_id_or_event_id() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();
        let handler = Uuid::now_v7();
        let c = classified(Severity::Critical, "Security");
        let a = store
            .upsert_alert_from_event(tenant, &event(10, None), &c, AlertLinkage::default())
            .unwrap()
            .unwrap();
        store
            .upsert_alert_from_event(tenant, &event(11, None), &c, AlertLinkage::default())
            .unwrap();

        let resolution = AlertResolution {
            resolved: true,
            action_taken: Some("Called driver".to_string()),
            root_cause: Some("Accidental press".to_string()),
            notes: None,
        };
        let handled = store
            .handle_alert(tenant, &a.id.to_string(), resolution.clone(), handler)
            .unwrap()
            .unwrap();
        assert_eq!(handled.status, AlertStatus::Handled);
        assert_eq!(handled.handled_by, Some(handler));
        assert!(handled.handled_at.is_some());
        assert_eq!(handled.resolution, Some(resolution));

        let by_event = store
            .handle_alert(tenant, "11", AlertResolution::default(), handler)
            .unwrap()
            .unwrap();
        assert_eq!(by_event.event_id, 11);

        // Handling again changes nothing.
        let again = store
            .handle_alert(tenant, "11", AlertResolution { resolved: true, ..Default::default() }, Uuid::now_v7())
            .unwrap()
            .unwrap();
        assert_eq!(again, by_event);
    }

    #[test]
    fn handle_missing_alert_is_none_and_empty_ref_is_invalid() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();
        let c = classified(Severity::Critical, "Security");
        let alert = store
            .upsert_alert_from_event(tenant, &event(20, None), &c, AlertLinkage::default())
            .unwrap()
            .unwrap();

        assert!(matches!(
            store.handle_alert(tenant, "  ", AlertResolution::default(), Uuid::now_v7()),
            Err(AlertError::Validation(_))
        ));
        let missing = store
            .handle_alert(tenant, "404", AlertResolution::default(), Uuid::now_v7())
            .unwrap();
        assert!(missing.is_none());

        // Other tenants cannot reach it.
        let foreign = store
            .handle_alert(Uuid::now_v7(), &alert.id.to_string(), AlertResolution::default(), Uuid::now_v7())
            .unwrap();
        assert!(foreign.is_none());
    }

    #[test]
    fn filters_are_conjunctive() {
        let (store, _dir) = store();
        let tenant = Uuid::now_v7();
        let vehicle = Uuid::now_v7();
        let device = Uuid::now_v7();
        let now = Utc::now();

        let linked = AlertLinkage {
            device_id: Some(device),
            traccar_device_id: Some(11),
            vehicle_id: Some(vehicle),
        };
        store
            .upsert_alert_from_event(
                tenant,
                &event(1, Some(now - TimeDelta::hours(3))),
                &classified(Severity::Critical, "Security"),
                linked.clone(),
            )
            .unwrap();
        store
            .upsert_alert_from_event(
                tenant,
                &event(2, Some(now - TimeDelta::hours(1))),
                &classified(Severity::Warning, "Logistics"),
                linked,
            )
            .unwrap();
        store
            .upsert_alert_from_event(
                tenant,
                &event(3, Some(now)),
                &classified(Severity::Critical, "Security"),
                AlertLinkage::default(),
            )
            .unwrap();
        store
            .handle_alert(tenant, "3", AlertResolution::default(), Uuid::now_v7())
            .unwrap();

        let events = |filters: AlertFilters| -> Vec<i64> {
            store
                .list_alerts(tenant, &filters)
                .iter()
                .map(|a| a.event_id)
                .collect()
        };

        assert_eq!(events(AlertFilters::default()), vec![3, 2, 1]);
        assert_eq!(
            events(AlertFilters {
                status: Some(AlertStatus::Pending),
                ..Default::default()
            }),
            vec![2, 1]
        );
        assert_eq!(
            events(AlertFilters {
                vehicle_id: Some(vehicle),
                severity: Some(Severity::Critical),
                ..Default::default()
            }),
            vec![1]
        );
        assert_eq!(
            events(AlertFilters {
                device_id: Some(device),
                category: Some("logistics".to_string()),
                ..Default::default()
            }),
            vec![2]
        );
        assert_eq!(
            events(AlertFilters {
                from: Some(now - TimeDelta::hours(2)),
                to: Some(now - TimeDelta::minutes(30)),
                ..Default::default()
            }),
            vec![2]
        );
    }

    #[test]
    fn alerts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Uuid::now_v7();
        {
            let store = AlertStore::open(dir.path()).unwrap();
            store
                .upsert_alert_from_event(
                    tenant,
                    &event(5, None),
                    &classified(Severity::Critical, "Security"),
                    AlertLinkage::default(),
                )
                .unwrap();
        }
        let reopened = AlertStore::open(dir.path()).unwrap();
        assert_eq!(reopened.list_alerts(tenant, &AlertFilters::default())[0].event_id, 5);
    }
}
