use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::directory::DirectoryStore;
use crate::models::{Mirror, NewMirror};
use crate::snapshot::{SnapshotError, SnapshotFile};

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("{0}")]
    Validation(String),
    #[error("Mirror not found")]
    NotFound,
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Registry of cross-tenant mirror grants.
pub struct MirrorRegistry {
    mirrors: DashMap<Uuid, Mirror>,
    snapshot: SnapshotFile,
    write_lock: Mutex<()>,
}

impl MirrorRegistry {
    pub fn open(data_dir: &Path) -> Result<Self, SnapshotError> {
        let snapshot = SnapshotFile::new(data_dir, "mirrors");
        let mirrors: Vec<Mirror> = snapshot.load()?.unwrap_or_default();

        Ok(Self {
            mirrors: mirrors.into_iter().map(|m| (m.id, m)).collect(),
            snapshot,
            write_lock: Mutex::new(()),
        })
    }

    /// Grant `new.target_tenant_id` a view of some of `owner_tenant_id`'s vehicles.
    pub fn create(
        &self,
        owner_tenant_id: Uuid,
        new: NewMirror,
        directory: &DirectoryStore,
    ) -> Result<Mirror, MirrorError> {
        if new.target_tenant_id == owner_tenant_id {
            return Err(MirrorError::Validation(
                "A tenant cannot mirror vehicles to itself".to_string(),
            ));
        }
        if new.vehicle_ids.is_empty() {
            return Err(MirrorError::Validation(
                "At least one vehicle is required".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (new.start_at, new.end_at) {
            if start > end {
                return Err(MirrorError::Validation(
                    "start_at must not be after end_at".to_string(),
                ));
            }
        }
        if let Some(foreign) = new
            .vehicle_ids
            .iter()
            .find(|id| directory.vehicle_scoped(owner_tenant_id, **id).is_none())
        {
            return Err(MirrorError::Validation(format!(
                "Vehicle {foreign} does not belong to the owner"
            )));
        }

        let mut vehicle_ids = new.vehicle_ids;
        vehicle_ids.sort();
        vehicle_ids.dedup();

        let mirror = Mirror {
            id: Uuid::now_v7(),
            owner_tenant_id,
            target_tenant_id: new.target_tenant_id,
            vehicle_ids,
            start_at: new.start_at,
            end_at: new.end_at,
            target_type: new.target_type,
            permission_group_id: new.permission_group_id,
            created_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.mirrors.insert(mirror.id, mirror.clone());
        if let Err(e) = self.persist() {
            self.mirrors.remove(&mirror.id);
            return Err(e.into());
        }

        tracing::info!(
            "Mirror {} created: {} -> {} ({} vehicles)",
            mirror.id,
            owner_tenant_id,
            mirror.target_tenant_id,
            mirror.vehicle_ids.len()
        );
        Ok(mirror)
    }

    /// Only the owner may revoke a mirror.
    pub fn revoke(&self, owner_tenant_id: Uuid, id: Uuid) -> Result<Mirror, MirrorError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let Some((_, mirror)) = self
            .mirrors
            .remove_if(&id, |_, m| m.owner_tenant_id == owner_tenant_id)
        else {
            return Err(MirrorError::NotFound);
        };

        if let Err(e) = self.persist() {
            self.mirrors.insert(mirror.id, mirror);
            return Err(e.into());
        }
        Ok(mirror)
    }

    pub fn get(&self, id: Uuid) -> Option<Mirror> {
        self.mirrors.get(&id).map(|m| m.value().clone())
    }

    pub fn list_by_owner(&self, owner_tenant_id: Uuid) -> Vec<Mirror> {
        self.collect(|m| m.owner_tenant_id == owner_tenant_id)
    }

    pub fn list_targeting(&self, target_tenant_id: Uuid) -> Vec<Mirror> {
        self.collect(|m| m.target_tenant_id == target_tenant_id)
    }

    pub fn active_targeting(&self, target_tenant_id: Uuid, at: DateTime<Utc>) -> Vec<Mirror> {
        self.collect(|m| m.target_tenant_id == target_tenant_id && m.is_active_at(at))
    }

    /// The active grant from `owner_tenant_id` to `target_tenant_id`, if any.
    /// When several overlap, their vehicle lists are merged.
    pub fn find_active_grant(
        &self,
        owner_tenant_id: Uuid,
        target_tenant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Option<Mirror> {
        let mut grants = self
            .active_targeting(target_tenant_id, at)
            .into_iter()
            .filter(|m| m.owner_tenant_id == owner_tenant_id);

        let mut grant = grants.next()?;
        for other in grants {
            grant.vehicle_ids.extend(other.vehicle_ids);
        }
        grant.vehicle_ids.sort();
        grant.vehicle_ids.dedup();
        Some(grant)
    }

    fn collect(&self, keep: impl Fn(&Mirror) -> bool) -> Vec<Mirror> {
        let mut mirrors: Vec<Mirror> = self
            .mirrors
            .iter()
            .filter(|m| keep(m.value()))
            .map(|m| m.value().clone())
            .collect();
        mirrors.sort_by_key(|m| (m.created_at, m.id));
        mirrors
    }

    fn persist(&self) -> Result<(), SnapshotError> {
        self.snapshot.write(&self.collect(|_| true))
    }
}
