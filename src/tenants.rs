use std::path::Path;
use std::sync::Mutex;

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::TenantProfile;
use crate::snapshot::{SnapshotError, SnapshotFile};

/// Tenant profiles, as far as access resolution needs them.
pub struct TenantRegistry {
    profiles: DashMap<Uuid, TenantProfile>,
    snapshot: SnapshotFile,
    write_lock: Mutex<()>,
}

impl TenantRegistry {
    pub fn open(data_dir: &Path) -> Result<Self, SnapshotError> {
        let snapshot = SnapshotFile::new(data_dir, "tenants");
        let profiles: Vec<TenantProfile> = snapshot.load()?.unwrap_or_default();

        Ok(Self {
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            snapshot,
            write_lock: Mutex::new(()),
        })
    }

    pub fn get(&self, id: Uuid) -> Option<TenantProfile> {
        self.profiles.get(&id).map(|p| p.value().clone())
    }

    /// Unknown tenants are treated as ordinary fleet owners.
    pub fn is_receiver(&self, id: Uuid) -> bool {
        self.profiles
            .get(&id)
            .is_some_and(|p| p.client_type.is_receiver())
    }

    pub fn list(&self) -> Vec<TenantProfile> {
        let mut all: Vec<TenantProfile> = self.profiles.iter().map(|p| p.value().clone()).collect();
        all.sort_by_key(|p| (p.created_at, p.id));
        all
    }

    pub fn upsert(&self, profile: TenantProfile) -> Result<TenantProfile, SnapshotError> {
        self.upsert_many(vec![profile.clone()])?;
        Ok(profile)
    }

    /// Used by the startup reconcile; relational profiles replace local ones.
    pub fn upsert_many(&self, profiles: Vec<TenantProfile>) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let previous: Vec<Option<TenantProfile>> = profiles
            .iter()
            .map(|p| self.profiles.insert(p.id, p.clone()))
            .collect();

        if let Err(e) = self.snapshot.write(&self.list()) {
            for (profile, previous) in profiles.iter().zip(previous) {
                match previous {
                    Some(previous) => self.profiles.insert(profile.id, previous),
                    None => self.profiles.remove(&profile.id).map(|(_, p)| p),
                };
            }
            return Err(e);
        }
        Ok(())
    }
}
