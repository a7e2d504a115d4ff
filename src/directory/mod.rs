//! Directory Store: the authoritative in-process registry of vehicles and devices.
//!
//! Reads are served from in-memory indexes. Every mutation updates the indexes,
//! rewrites the collection's local snapshot before returning, and queues a
//! best-effort upsert/delete for the relational layer.

mod devices;
mod vehicles;

use std::collections::HashSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::models::{Device, Vehicle};
use crate::snapshot::{SnapshotError, SnapshotFile};
use crate::sync::SyncQueue;

pub use devices::DeviceIndex;
pub use vehicles::VehicleIndex;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Conflict { message: String, existing_id: Uuid },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

pub struct DirectoryStore {
    vehicles: RwLock<VehicleIndex>,
    devices: RwLock<DeviceIndex>,
    vehicle_snapshot: SnapshotFile,
    device_snapshot: SnapshotFile,
    sync: SyncQueue,
}

impl DirectoryStore {
    /// Load both collections from their snapshots in `data_dir`.
    pub fn open(data_dir: &Path, sync: SyncQueue) -> Result<Self, SnapshotError> {
        let vehicle_snapshot = SnapshotFile::new(data_dir, "vehicles");
        let device_snapshot = SnapshotFile::new(data_dir, "devices");

        let vehicles: Vec<Vehicle> = vehicle_snapshot.load()?.unwrap_or_default();
        let devices: Vec<Device> = device_snapshot.load()?.unwrap_or_default();

        tracing::info!(
            "Directory snapshot loaded ({} vehicles, {} devices)",
            vehicles.len(),
            devices.len()
        );

        Ok(Self {
            vehicles: RwLock::new(VehicleIndex::from_records(vehicles)),
            devices: RwLock::new(DeviceIndex::from_records(devices)),
            vehicle_snapshot,
            device_snapshot,
            sync,
        })
    }

    /// Merge records from the relational layer into the loaded snapshot.
    ///
    /// Relational records win on id collisions since they carry changes made
    /// outside this process. Snapshot-only records are kept.
    pub fn reconcile(
        &self,
        remote_vehicles: Vec<Vehicle>,
        remote_devices: Vec<Device>,
    ) -> Result<(), SnapshotError> {
        let mut vehicles = write(&self.vehicles);
        let mut devices = write(&self.devices);

        let merged_vehicles = merge_records(
            remote_vehicles,
            vehicles.all().into_iter().cloned().collect(),
            |v| v.id,
        );
        let merged_devices = merge_records(
            remote_devices,
            devices.all().into_iter().cloned().collect(),
            |d| d.id,
        );

        *vehicles = VehicleIndex::from_records(merged_vehicles);
        *devices = DeviceIndex::from_records(merged_devices);

        self.vehicle_snapshot.write(&vehicles.all())?;
        self.device_snapshot.write(&devices.all())?;

        tracing::info!(
            "Directory reconciled with relational layer ({} vehicles, {} devices)",
            vehicles.len(),
            devices.len()
        );
        Ok(())
    }

    /// Rewrite both snapshots after an in-memory rollback of a two-collection mutation.
    fn restore_snapshots(&self, vehicles: &VehicleIndex, devices: &DeviceIndex) {
        let restored = self
            .vehicle_snapshot
            .write(&vehicles.all())
            .and_then(|_| self.device_snapshot.write(&devices.all()));
        if let Err(e) = restored {
            tracing::error!("Failed to restore directory snapshots after rollback: {e}");
        }
    }
}

/// `preferred` first, then any `fallback` record whose id is not already present.
fn merge_records<T, F>(preferred: Vec<T>, fallback: Vec<T>, id: F) -> Vec<T>
where
    F: Fn(&T) -> Uuid,
{
    let mut seen = HashSet::with_capacity(preferred.len());
    let mut merged = Vec::with_capacity(preferred.len() + fallback.len());
    for record in preferred.into_iter().chain(fallback) {
        if seen.insert(id(&record)) {
            merged.push(record);
        }
    }
    merged
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn required(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests;
