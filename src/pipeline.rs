//! Live events: scoped event fetch, classification and alert ingestion.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::access::AccessScope;
use crate::events::EventSource;
use crate::models::{Alert, AlertLinkage, ClassifiedEvent, TelemetryEvent};
use crate::state::AppState;
use crate::telemetry::{self, TelemetryError};

#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    #[serde(flatten)]
    pub event: TelemetryEvent,
    pub classification: ClassifiedEvent,
    /// Directory device and vehicle the event belongs to.
    pub device: Uuid,
    pub vehicle: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveEvents {
    pub events: Vec<LiveEvent>,
    pub alerts: Vec<Alert>,
}

/// Fetch the scope's events in `[from, to]`, classify them with `tenant_id`'s
/// configuration and ingest the ones that need handling as alerts. An alert that
/// cannot be stored is logged and its event is still returned.
pub async fn live_events(
    state: &AppState,
    tenant_id: Uuid,
    scope: &AccessScope,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: i64,
) -> Result<LiveEvents, TelemetryError> {
    let raw = telemetry::fetch_events(
        state.telemetry.as_ref(),
        &scope.accessible_device_ids,
        from,
        to,
        limit,
    )
    .await?;

    let mut result = LiveEvents::default();
    for event in raw {
        // Rows for devices outside the scope are dropped.
        let Some(device) = scope.device_by_traccar_id(event.device_id) else {
            tracing::warn!("Dropping event {} for out-of-scope device {}", event.id, event.device_id);
            continue;
        };

        let protocol = event
            .attributes
            .protocol()
            .or_else(|| device.protocol())
            .unwrap_or("unknown")
            .to_string();

        let classification = state.event_config.resolve_event_configuration(
            tenant_id,
            &protocol,
            event.raw_code(),
            EventSource {
                device_id: Some(event.device_id),
                payload: Some(&event.attributes),
            },
        );

        let linkage = AlertLinkage {
            device_id: Some(device.id),
            traccar_device_id: device.traccar_id,
            vehicle_id: device.vehicle_id,
        };
        match state
            .alerts
            .upsert_alert_from_event(tenant_id, &event, &classification, linkage)
        {
            Ok(Some(alert)) => result.alerts.push(alert),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Failed to store alert for event {}: {e}", event.id);
            }
        }

        result.events.push(LiveEvent {
            device: device.id,
            vehicle: device.vehicle_id,
            event,
            classification,
        });
    }

    Ok(result)
}
