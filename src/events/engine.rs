use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::catalog::{self, CatalogEntry};
use super::normalize::{normalize_code, normalize_protocol, recover_diagnostic_code};
use crate::models::{
    Attributes, ClassifiedEvent, EventConfigEntry, EventConfigUpdate, EventConfigView, Severity,
    TenantEventConfig,
};
use crate::snapshot::{SnapshotError, SnapshotFile};

type OverlayKey = (Uuid, String);
type Overlay = BTreeMap<String, EventConfigEntry>;

/// Severity given to codes the catalog does not know.
const UNMAPPED_SEVERITY: Severity = Severity::Warning;

/// Per-tenant, per-protocol overlay on top of the static catalog.
pub struct EventConfigStore {
    overlays: DashMap<OverlayKey, Overlay>,
    snapshot: SnapshotFile,
    write_lock: Mutex<()>,
}

/// Where a raw event is coming from, for the unmapped-code log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSource<'a> {
    pub device_id: Option<i64>,
    pub payload: Option<&'a Attributes>,
}

impl EventConfigStore {
    pub fn open(data_dir: &Path) -> Result<Self, SnapshotError> {
        let snapshot = SnapshotFile::new(data_dir, "event_config");
        let saved: Vec<TenantEventConfig> = snapshot.load()?.unwrap_or_default();

        let overlays = saved
            .into_iter()
            .map(|config| {
                let entries = config
                    .entries
                    .into_iter()
                    .map(|e| (normalize_code(&config.protocol, &e.code), e))
                    .collect();
                ((config.tenant_id, config.protocol), entries)
            })
            .collect();

        Ok(Self {
            overlays,
            snapshot,
            write_lock: Mutex::new(()),
        })
    }

    /// Classify one raw event code for `tenant_id`. Never fails: unknown codes are
    /// registered in the tenant overlay as unmapped and classified with fallback values.
    pub fn resolve_event_configuration(
        &self,
        tenant_id: Uuid,
        protocol: &str,
        raw_code: &str,
        source: EventSource<'_>,
    ) -> ClassifiedEvent {
        let protocol = normalize_protocol(protocol);
        let code = normalize_code(&protocol, raw_code);

        let known = catalog::lookup(&protocol, &code).or_else(|| {
            if protocol == "suntech" {
                recover_diagnostic_code(raw_code, source.payload.unwrap_or(&Attributes::new()))
            } else {
                None
            }
        });

        match known {
            Some(known) => {
                let overlay = self.entry(tenant_id, &protocol, known.code);
                classify(&protocol, known.code, Some(known), overlay.as_ref())
            }
            None => {
                let overlay = self.register_unmapped(tenant_id, &protocol, &code, source);
                classify(&protocol, &code, None, Some(&overlay))
            }
        }
    }

    /// Effective configuration for every code of `protocol`, catalog codes first
    /// seeded into the tenant overlay so later reads are stable.
    pub fn get_event_config(&self, tenant_id: Uuid, protocol: &str) -> Vec<EventConfigView> {
        let protocol = normalize_protocol(protocol);
        let key = (tenant_id, protocol.clone());

        let seeded = {
            let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
            let mut overlay = self.overlays.entry(key.clone()).or_default();
            let mut seeded = false;
            for known in catalog::entries(&protocol) {
                if !overlay.contains_key(known.code) {
                    overlay.insert(known.code.to_string(), seed(known));
                    seeded = true;
                }
            }
            drop(overlay);
            if seeded {
                self.persist_logged();
            }
            seeded
        };
        if seeded {
            tracing::debug!("Seeded event config for tenant {tenant_id}, protocol {protocol}");
        }

        self.views(&key)
    }

    /// Apply a bulk edit. Fields left out of an update keep their current value.
    pub fn update_event_config(
        &self,
        tenant_id: Uuid,
        protocol: &str,
        updates: Vec<EventConfigUpdate>,
    ) -> Result<Vec<EventConfigView>, SnapshotError> {
        let protocol = normalize_protocol(protocol);
        let key = (tenant_id, protocol.clone());
        let now = Utc::now();

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous = self.overlays.get(&key).map(|o| o.value().clone());

        {
            let mut overlay = self.overlays.entry(key.clone()).or_default();
            for update in updates {
                let code = normalize_code(&protocol, &update.code);
                let known = catalog::lookup(&protocol, &code);
                let entry = overlay
                    .entry(code.clone())
                    .or_insert_with(|| blank(&code, known.is_none()));

                if let Some(name) = update.display_name {
                    let name = name.trim().to_string();
                    entry.display_name = (!name.is_empty()).then_some(name);
                }
                if update.severity.is_some() {
                    entry.severity = update.severity;
                }
                if update.active.is_some() {
                    entry.active = update.active;
                }
                if let Some(category) = update.category {
                    let category = category.trim().to_string();
                    entry.category = (!category.is_empty()).then_some(category);
                }
                if update.requires_handling.is_some() {
                    entry.requires_handling = update.requires_handling;
                }
                entry.updated_at = now;
            }
        }

        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => self.overlays.insert(key, previous),
                None => self.overlays.remove(&key).map(|(_, o)| o),
            };
            return Err(e);
        }

        Ok(self.views(&(tenant_id, protocol)))
    }

    fn entry(&self, tenant_id: Uuid, protocol: &str, code: &str) -> Option<EventConfigEntry> {
        self.overlays
            .get(&(tenant_id, protocol.to_string()))
            .and_then(|overlay| overlay.get(code).cloned())
    }

    fn register_unmapped(
        &self,
        tenant_id: Uuid,
        protocol: &str,
        code: &str,
        source: EventSource<'_>,
    ) -> EventConfigEntry {
        if let Some(existing) = self.entry(tenant_id, protocol, code) {
            tracing::debug!("Unmapped event code {protocol}/{code} for tenant {tenant_id}");
            return existing;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let (entry, inserted) = {
            let mut overlay = self
                .overlays
                .entry((tenant_id, protocol.to_string()))
                .or_default();
            match overlay.get(code) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let entry = blank(code, true);
                    overlay.insert(code.to_string(), entry.clone());
                    (entry, true)
                }
            }
        };

        if inserted {
            let payload = source
                .payload
                .and_then(|p| serde_json::to_string(p).ok())
                .unwrap_or_default();
            tracing::warn!(
                "Unmapped event code registered: protocol={protocol} code={code} tenant={tenant_id} device={:?} payload={payload}",
                source.device_id
            );
            self.persist_logged();
        }
        entry
    }

    fn views(&self, key: &OverlayKey) -> Vec<EventConfigView> {
        let (_, protocol) = key;
        let Some(overlay) = self.overlays.get(key) else {
            return Vec::new();
        };

        overlay
            .values()
            .map(|entry| {
                let known = catalog::lookup(protocol, &entry.code);
                let classified = classify(protocol, &entry.code, known, Some(entry));
                EventConfigView {
                    code: entry.code.clone(),
                    default_label: known.map(|k| k.label.to_string()),
                    label: classified.label,
                    severity: classified.severity,
                    active: classified.active,
                    category: classified.category,
                    requires_handling: classified.requires_handling,
                    is_mapped: classified.is_mapped,
                }
            })
            .collect()
    }

    fn persist(&self) -> Result<(), SnapshotError> {
        let mut all: Vec<TenantEventConfig> = self
            .overlays
            .iter()
            .map(|item| {
                let (tenant_id, protocol) = item.key();
                TenantEventConfig {
                    tenant_id: *tenant_id,
                    protocol: protocol.clone(),
                    entries: item.value().values().cloned().collect(),
                }
            })
            .collect();
        all.sort_by(|a, b| (a.tenant_id, &a.protocol).cmp(&(b.tenant_id, &b.protocol)));
        self.snapshot.write(&all)
    }

    /// Classification must keep working when the snapshot cannot be written.
    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            tracing::error!("Failed to write event config snapshot: {e}");
        }
    }
}

/// Merge catalog defaults with a tenant overlay; overlay values win when present.
fn classify(
    protocol: &str,
    code: &str,
    known: Option<&CatalogEntry>,
    overlay: Option<&EventConfigEntry>,
) -> ClassifiedEvent {
    let label = overlay
        .and_then(|o| o.display_name.clone())
        .or_else(|| known.map(|k| k.label.to_string()))
        .unwrap_or_else(|| code.to_string());

    let category = overlay
        .and_then(|o| o.category.clone())
        .or_else(|| known.and_then(|k| k.category).map(str::to_string))
        .unwrap_or_else(|| catalog::default_category(code).to_string());

    ClassifiedEvent {
        id: code.to_string(),
        protocol: protocol.to_string(),
        label,
        severity: overlay
            .and_then(|o| o.severity)
            .or(known.map(|k| k.severity))
            .unwrap_or(UNMAPPED_SEVERITY),
        active: overlay.and_then(|o| o.active).unwrap_or(true),
        category,
        requires_handling: overlay
            .and_then(|o| o.requires_handling)
            .or(known.map(|k| k.requires_handling))
            .unwrap_or(false),
        is_mapped: known.is_some(),
    }
}

fn seed(known: &CatalogEntry) -> EventConfigEntry {
    EventConfigEntry {
        code: known.code.to_string(),
        display_name: None,
        severity: Some(known.severity),
        active: Some(true),
        category: known.category.map(str::to_string),
        requires_handling: Some(known.requires_handling),
        unmapped: false,
        updated_at: Utc::now(),
    }
}

fn blank(code: &str, unmapped: bool) -> EventConfigEntry {
    EventConfigEntry {
        code: code.to_string(),
        display_name: None,
        severity: unmapped.then_some(UNMAPPED_SEVERITY),
        active: unmapped.then_some(true),
        category: None,
        requires_handling: unmapped.then_some(false),
        unmapped,
        updated_at: Utc::now(),
    }
}
