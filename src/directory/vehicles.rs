use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use uuid::Uuid;

use super::{DirectoryError, DirectoryStore, read, required, write};
use crate::models::vehicle::normalize_plate;
use crate::models::{NewVehicle, Vehicle, VehicleChanges};
use crate::sync::SyncCommand;

/// Vehicles by id, with a per-tenant case-insensitive plate index.
#[derive(Debug, Clone, Default)]
pub struct VehicleIndex {
    by_id: HashMap<Uuid, Vehicle>,
    by_plate: HashMap<(Uuid, String), Uuid>,
    by_tenant: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl VehicleIndex {
    pub(super) fn from_records(records: Vec<Vehicle>) -> Self {
        let mut index = Self::default();
        for vehicle in records {
            if let Some(existing) = index.plate_owner(vehicle.tenant_id, &vehicle.plate) {
                tracing::warn!(
                    "Vehicle {} shares plate '{}' with {} in tenant {}",
                    vehicle.id,
                    vehicle.plate,
                    existing,
                    vehicle.tenant_id
                );
            }
            index.insert(vehicle);
        }
        index
    }

    /// Insert or replace; stale index entries of a replaced record are cleared first.
    pub(super) fn insert(&mut self, vehicle: Vehicle) {
        self.remove(vehicle.id);
        self.by_plate
            .entry((vehicle.tenant_id, normalize_plate(&vehicle.plate)))
            .or_insert(vehicle.id);
        self.by_tenant
            .entry(vehicle.tenant_id)
            .or_default()
            .insert(vehicle.id);
        self.by_id.insert(vehicle.id, vehicle);
    }

    pub(super) fn remove(&mut self, id: Uuid) -> Option<Vehicle> {
        let vehicle = self.by_id.remove(&id)?;
        let key = (vehicle.tenant_id, normalize_plate(&vehicle.plate));
        if self.by_plate.get(&key) == Some(&id) {
            self.by_plate.remove(&key);
        }
        if let Some(ids) = self.by_tenant.get_mut(&vehicle.tenant_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_tenant.remove(&vehicle.tenant_id);
            }
        }
        Some(vehicle)
    }

    pub(super) fn get(&self, id: Uuid) -> Option<&Vehicle> {
        self.by_id.get(&id)
    }

    pub(super) fn plate_owner(&self, tenant_id: Uuid, plate: &str) -> Option<Uuid> {
        self.by_plate
            .get(&(tenant_id, normalize_plate(plate)))
            .copied()
    }

    pub(super) fn list_by_tenant(&self, tenant_id: Uuid) -> Vec<Vehicle> {
        self.by_tenant
            .get(&tenant_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Every record in creation order, the shape written to the snapshot.
    pub(super) fn all(&self) -> Vec<&Vehicle> {
        let mut all: Vec<&Vehicle> = self.by_id.values().collect();
        all.sort_by_key(|v| (v.created_at, v.id));
        all
    }

    pub(super) fn len(&self) -> usize {
        self.by_id.len()
    }
}

impl DirectoryStore {
    pub fn create_vehicle(
        &self,
        tenant_id: Uuid,
        new: NewVehicle,
    ) -> Result<Vehicle, DirectoryError> {
        let (Some(plate), Some(model), Some(vehicle_type)) = (
            required(&new.plate),
            required(&new.model),
            required(&new.vehicle_type),
        ) else {
            return Err(DirectoryError::Validation(
                "plate, model and vehicle_type are required".to_string(),
            ));
        };

        let mut index = write(&self.vehicles);

        if let Some(existing_id) = index.plate_owner(tenant_id, &plate) {
            return Err(DirectoryError::Conflict {
                message: format!("A vehicle with plate {plate} already exists"),
                existing_id,
            });
        }

        let now = Utc::now();
        let vehicle = Vehicle {
            id: Uuid::now_v7(),
            tenant_id,
            plate,
            model,
            brand: new.brand.and_then(|b| required(&b)),
            vehicle_type,
            status: new.status,
            device_id: None,
            created_at: now,
            updated_at: now,
        };

        let backup = index.clone();
        index.insert(vehicle.clone());
        if let Err(e) = self.vehicle_snapshot.write(&index.all()) {
            *index = backup;
            return Err(e.into());
        }

        self.sync.push(SyncCommand::UpsertVehicle(vehicle.clone()));
        tracing::debug!("Vehicle {} created for tenant {tenant_id}", vehicle.id);
        Ok(vehicle)
    }

    pub fn update_vehicle(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: VehicleChanges,
    ) -> Result<Vehicle, DirectoryError> {
        let mut index = write(&self.vehicles);

        let mut vehicle = index
            .get(id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .ok_or(DirectoryError::NotFound("Vehicle"))?;

        if let Some(plate) = changes.plate {
            let plate = required(&plate).ok_or_else(|| {
                DirectoryError::Validation("plate cannot be empty".to_string())
            })?;
            if let Some(existing_id) = index
                .plate_owner(tenant_id, &plate)
                .filter(|existing| *existing != id)
            {
                return Err(DirectoryError::Conflict {
                    message: format!("A vehicle with plate {plate} already exists"),
                    existing_id,
                });
            }
            vehicle.plate = plate;
        }
        if let Some(model) = changes.model {
            vehicle.model = required(&model)
                .ok_or_else(|| DirectoryError::Validation("model cannot be empty".to_string()))?;
        }
        if let Some(vehicle_type) = changes.vehicle_type {
            vehicle.vehicle_type = required(&vehicle_type).ok_or_else(|| {
                DirectoryError::Validation("vehicle_type cannot be empty".to_string())
            })?;
        }
        if let Some(brand) = changes.brand {
            vehicle.brand = required(&brand);
        }
        if let Some(status) = changes.status {
            vehicle.status = status;
        }
        vehicle.updated_at = Utc::now();

        let backup = index.clone();
        index.insert(vehicle.clone());
        if let Err(e) = self.vehicle_snapshot.write(&index.all()) {
            *index = backup;
            return Err(e.into());
        }

        self.sync.push(SyncCommand::UpsertVehicle(vehicle.clone()));
        Ok(vehicle)
    }

    /// Remove a vehicle and clear the vehicle link of every device pointing at it.
    pub fn delete_vehicle(&self, tenant_id: Uuid, id: Uuid) -> Result<Vehicle, DirectoryError> {
        let mut vehicles = write(&self.vehicles);
        let mut devices = write(&self.devices);

        if vehicles.get(id).is_none_or(|v| v.tenant_id != tenant_id) {
            return Err(DirectoryError::NotFound("Vehicle"));
        }

        let vehicle_backup = vehicles.clone();
        let device_backup = devices.clone();

        let Some(removed) = vehicles.remove(id) else {
            return Err(DirectoryError::NotFound("Vehicle"));
        };
        let now = Utc::now();
        let unlinked: Vec<_> = devices
            .linked_to(id)
            .into_iter()
            .map(|mut device| {
                device.vehicle_id = None;
                device.updated_at = now;
                device
            })
            .collect();
        for device in &unlinked {
            devices.insert(device.clone());
        }

        let persisted = self
            .vehicle_snapshot
            .write(&vehicles.all())
            .and_then(|_| self.device_snapshot.write(&devices.all()));
        if let Err(e) = persisted {
            *vehicles = vehicle_backup;
            *devices = device_backup;
            self.restore_snapshots(&vehicles, &devices);
            return Err(e.into());
        }

        self.sync.push(SyncCommand::DeleteVehicle(id));
        for device in unlinked {
            self.sync.push(SyncCommand::UpsertDevice(device));
        }
        tracing::debug!("Vehicle {id} deleted from tenant {tenant_id}");
        Ok(removed)
    }

    /// Unscoped lookup by raw id, for internal callers that already hold authority.
    pub fn vehicle_by_id(&self, id: Uuid) -> Option<Vehicle> {
        read(&self.vehicles).get(id).cloned()
    }

    /// Tenant-scoped lookup: a vehicle of another tenant is reported as absent.
    pub fn vehicle_scoped(&self, tenant_id: Uuid, id: Uuid) -> Option<Vehicle> {
        read(&self.vehicles)
            .get(id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
    }

    pub fn vehicle_by_plate(&self, tenant_id: Uuid, plate: &str) -> Option<Vehicle> {
        let index = read(&self.vehicles);
        index
            .plate_owner(tenant_id, plate)
            .and_then(|id| index.get(id))
            .cloned()
    }

    pub fn list_vehicles(&self, tenant_id: Uuid) -> Vec<Vehicle> {
        read(&self.vehicles).list_by_tenant(tenant_id)
    }
}
