use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use uuid::Uuid;

use super::{DirectoryError, DirectoryStore, read, required, write};
use crate::models::device::normalize_unique_id;
use crate::models::{Device, DeviceChanges, NewDevice};
use crate::sync::SyncCommand;

/// Devices by id, with global unique-id and tracking-backend-id indexes.
#[derive(Debug, Clone, Default)]
pub struct DeviceIndex {
    by_id: HashMap<Uuid, Device>,
    by_unique_id: HashMap<String, Uuid>,
    by_traccar_id: HashMap<i64, Uuid>,
    by_tenant: HashMap<Uuid, BTreeSet<Uuid>>,
    by_vehicle: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl DeviceIndex {
    pub(super) fn from_records(records: Vec<Device>) -> Self {
        let mut index = Self::default();
        for device in records {
            if let Some(existing) = index.unique_id_owner(&device.unique_id) {
                tracing::warn!(
                    "Device {} shares unique id '{}' with {}",
                    device.id,
                    device.unique_id,
                    existing
                );
            }
            index.insert(device);
        }
        index
    }

    pub(super) fn insert(&mut self, device: Device) {
        self.remove(device.id);
        self.by_unique_id
            .entry(normalize_unique_id(&device.unique_id))
            .or_insert(device.id);
        if let Some(traccar_id) = device.traccar_id {
            self.by_traccar_id.entry(traccar_id).or_insert(device.id);
        }
        self.by_tenant
            .entry(device.tenant_id)
            .or_default()
            .insert(device.id);
        if let Some(vehicle_id) = device.vehicle_id {
            self.by_vehicle.entry(vehicle_id).or_default().insert(device.id);
        }
        self.by_id.insert(device.id, device);
    }

    pub(super) fn remove(&mut self, id: Uuid) -> Option<Device> {
        let device = self.by_id.remove(&id)?;

        let key = normalize_unique_id(&device.unique_id);
        if self.by_unique_id.get(&key) == Some(&id) {
            self.by_unique_id.remove(&key);
        }
        if let Some(traccar_id) = device.traccar_id {
            if self.by_traccar_id.get(&traccar_id) == Some(&id) {
                self.by_traccar_id.remove(&traccar_id);
            }
        }
        remove_from_set(&mut self.by_tenant, device.tenant_id, id);
        if let Some(vehicle_id) = device.vehicle_id {
            remove_from_set(&mut self.by_vehicle, vehicle_id, id);
        }
        Some(device)
    }

    pub(super) fn get(&self, id: Uuid) -> Option<&Device> {
        self.by_id.get(&id)
    }

    pub(super) fn unique_id_owner(&self, unique_id: &str) -> Option<Uuid> {
        self.by_unique_id.get(&normalize_unique_id(unique_id)).copied()
    }

    pub(super) fn traccar_id_owner(&self, traccar_id: i64) -> Option<Uuid> {
        self.by_traccar_id.get(&traccar_id).copied()
    }

    pub(super) fn linked_to(&self, vehicle_id: Uuid) -> Vec<Device> {
        self.by_vehicle
            .get(&vehicle_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub(super) fn list_by_tenant(&self, tenant_id: Uuid) -> Vec<Device> {
        self.by_tenant
            .get(&tenant_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub(super) fn all(&self) -> Vec<&Device> {
        let mut all: Vec<&Device> = self.by_id.values().collect();
        all.sort_by_key(|d| (d.created_at, d.id));
        all
    }

    pub(super) fn len(&self) -> usize {
        self.by_id.len()
    }
}

fn remove_from_set(map: &mut HashMap<Uuid, BTreeSet<Uuid>>, key: Uuid, id: Uuid) {
    if let Some(ids) = map.get_mut(&key) {
        ids.remove(&id);
        if ids.is_empty() {
            map.remove(&key);
        }
    }
}

fn unique_id_conflict(unique_id: &str, existing_id: Uuid) -> DirectoryError {
    DirectoryError::Conflict {
        message: format!("A device with unique id {unique_id} already exists"),
        existing_id,
    }
}

fn traccar_id_conflict(traccar_id: i64, existing_id: Uuid) -> DirectoryError {
    DirectoryError::Conflict {
        message: format!("Tracking id {traccar_id} is already assigned to another device"),
        existing_id,
    }
}

impl DirectoryStore {
    pub fn create_device(&self, tenant_id: Uuid, new: NewDevice) -> Result<Device, DirectoryError> {
        let unique_id = required(&new.unique_id)
            .ok_or_else(|| DirectoryError::Validation("unique_id is required".to_string()))?;

        let mut index = write(&self.devices);

        if let Some(existing_id) = index.unique_id_owner(&unique_id) {
            return Err(unique_id_conflict(&unique_id, existing_id));
        }
        if let Some(traccar_id) = new.traccar_id {
            if let Some(existing_id) = index.traccar_id_owner(traccar_id) {
                return Err(traccar_id_conflict(traccar_id, existing_id));
            }
        }

        let now = Utc::now();
        let device = Device {
            id: Uuid::now_v7(),
            tenant_id,
            unique_id,
            traccar_id: new.traccar_id,
            name: new.name.and_then(|n| required(&n)),
            vehicle_id: None,
            chip_id: new.chip_id,
            attributes: new.attributes,
            created_at: now,
            updated_at: now,
        };

        let backup = index.clone();
        index.insert(device.clone());
        if let Err(e) = self.device_snapshot.write(&index.all()) {
            *index = backup;
            return Err(e.into());
        }

        self.sync.push(SyncCommand::UpsertDevice(device.clone()));
        tracing::debug!("Device {} created for tenant {tenant_id}", device.id);
        Ok(device)
    }

    pub fn update_device(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: DeviceChanges,
    ) -> Result<Device, DirectoryError> {
        let mut index = write(&self.devices);

        let mut device = index
            .get(id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .ok_or(DirectoryError::NotFound("Device"))?;

        if let Some(unique_id) = changes.unique_id {
            let unique_id = required(&unique_id).ok_or_else(|| {
                DirectoryError::Validation("unique_id cannot be empty".to_string())
            })?;
            if let Some(existing_id) = index
                .unique_id_owner(&unique_id)
                .filter(|existing| *existing != id)
            {
                return Err(unique_id_conflict(&unique_id, existing_id));
            }
            device.unique_id = unique_id;
        }
        if let Some(traccar_id) = changes.traccar_id {
            if let Some(wanted) = traccar_id {
                if let Some(existing_id) = index
                    .traccar_id_owner(wanted)
                    .filter(|existing| *existing != id)
                {
                    return Err(traccar_id_conflict(wanted, existing_id));
                }
            }
            device.traccar_id = traccar_id;
        }
        if let Some(name) = changes.name {
            device.name = required(&name);
        }
        if let Some(chip_id) = changes.chip_id {
            device.chip_id = chip_id;
        }
        if let Some(attributes) = changes.attributes {
            device.attributes = attributes;
        }
        device.updated_at = Utc::now();

        let backup = index.clone();
        index.insert(device.clone());
        if let Err(e) = self.device_snapshot.write(&index.all()) {
            *index = backup;
            return Err(e.into());
        }

        self.sync.push(SyncCommand::UpsertDevice(device.clone()));
        Ok(device)
    }

    /// Remove a device and clear the device link of the vehicle it was on.
    pub fn delete_device(&self, tenant_id: Uuid, id: Uuid) -> Result<Device, DirectoryError> {
        let mut vehicles = write(&self.vehicles);
        let mut devices = write(&self.devices);

        if devices.get(id).is_none_or(|d| d.tenant_id != tenant_id) {
            return Err(DirectoryError::NotFound("Device"));
        }

        let vehicle_backup = vehicles.clone();
        let device_backup = devices.clone();

        let Some(removed) = devices.remove(id) else {
            return Err(DirectoryError::NotFound("Device"));
        };
        let unlinked = removed
            .vehicle_id
            .and_then(|vehicle_id| vehicles.get(vehicle_id))
            .filter(|v| v.device_id == Some(id))
            .cloned()
            .map(|mut vehicle| {
                vehicle.device_id = None;
                vehicle.updated_at = Utc::now();
                vehicle
            });
        if let Some(vehicle) = &unlinked {
            vehicles.insert(vehicle.clone());
        }

        let persisted = self
            .device_snapshot
            .write(&devices.all())
            .and_then(|_| self.vehicle_snapshot.write(&vehicles.all()));
        if let Err(e) = persisted {
            *vehicles = vehicle_backup;
            *devices = device_backup;
            self.restore_snapshots(&vehicles, &devices);
            return Err(e.into());
        }

        self.sync.push(SyncCommand::DeleteDevice(id));
        if let Some(vehicle) = unlinked {
            self.sync.push(SyncCommand::UpsertVehicle(vehicle));
        }
        Ok(removed)
    }

    /// Link a device to a vehicle of the same tenant.
    ///
    /// The device's previous vehicle and the vehicle's previous device are
    /// unlinked first, so each side ends up with exactly one counterpart.
    pub fn link_device(
        &self,
        tenant_id: Uuid,
        device_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Device, DirectoryError> {
        let mut vehicles = write(&self.vehicles);
        let mut devices = write(&self.devices);

        let mut device = devices
            .get(device_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .ok_or(DirectoryError::NotFound("Device"))?;
        let mut vehicle = vehicles
            .get(vehicle_id)
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .ok_or(DirectoryError::NotFound("Vehicle"))?;

        if device.vehicle_id == Some(vehicle_id) && vehicle.device_id == Some(device_id) {
            return Ok(device);
        }

        let vehicle_backup = vehicles.clone();
        let device_backup = devices.clone();
        let now = Utc::now();
        let mut touched_vehicles = Vec::new();
        let mut touched_devices = Vec::new();

        if let Some(previous) = device
            .vehicle_id
            .filter(|v| *v != vehicle_id)
            .and_then(|v| vehicles.get(v))
            .filter(|v| v.device_id == Some(device_id))
            .cloned()
        {
            let mut previous = previous;
            previous.device_id = None;
            previous.updated_at = now;
            vehicles.insert(previous.clone());
            touched_vehicles.push(previous);
        }

        if let Some(previous) = vehicle
            .device_id
            .filter(|d| *d != device_id)
            .and_then(|d| devices.get(d))
            .filter(|d| d.vehicle_id == Some(vehicle_id))
            .cloned()
        {
            let mut previous = previous;
            previous.vehicle_id = None;
            previous.updated_at = now;
            devices.insert(previous.clone());
            touched_devices.push(previous);
        }

        device.vehicle_id = Some(vehicle_id);
        device.updated_at = now;
        vehicle.device_id = Some(device_id);
        vehicle.updated_at = now;
        devices.insert(device.clone());
        vehicles.insert(vehicle.clone());
        touched_devices.push(device.clone());
        touched_vehicles.push(vehicle);

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

        for vehicle in touched_vehicles {
            self.sync.push(SyncCommand::UpsertVehicle(vehicle));
        }
        for device in touched_devices {
            self.sync.push(SyncCommand::UpsertDevice(device));
        }
        Ok(device)
    }

    /// Clear a device's vehicle and chip links. Calling it on an already
    /// unlinked device is a no-op that returns the device unchanged.
    pub fn unlink_device(&self, tenant_id: Uuid, device_id: Uuid) -> Result<Device, DirectoryError> {
        let mut vehicles = write(&self.vehicles);
        let mut devices = write(&self.devices);

        let mut device = devices
            .get(device_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .ok_or(DirectoryError::NotFound("Device"))?;

        if device.vehicle_id.is_none() && device.chip_id.is_none() {
            return Ok(device);
        }

        let vehicle_backup = vehicles.clone();
        let device_backup = devices.clone();
        let now = Utc::now();

        let unlinked = device
            .vehicle_id
            .and_then(|v| vehicles.get(v))
            .filter(|v| v.device_id == Some(device_id))
            .cloned()
            .map(|mut vehicle| {
                vehicle.device_id = None;
                vehicle.updated_at = now;
                vehicle
            });
        if let Some(vehicle) = &unlinked {
            vehicles.insert(vehicle.clone());
        }

        device.vehicle_id = None;
        device.chip_id = None;
        device.updated_at = now;
        devices.insert(device.clone());

        let persisted = self
            .device_snapshot
            .write(&devices.all())
            .and_then(|_| self.vehicle_snapshot.write(&vehicles.all()));
        if let Err(e) = persisted {
            *vehicles = vehicle_backup;
            *devices = device_backup;
            self.restore_snapshots(&vehicles, &devices);
            return Err(e.into());
        }

        self.sync.push(SyncCommand::UpsertDevice(device.clone()));
        if let Some(vehicle) = unlinked {
            self.sync.push(SyncCommand::UpsertVehicle(vehicle));
        }
        Ok(device)
    }

    pub fn device_by_id(&self, id: Uuid) -> Option<Device> {
        read(&self.devices).get(id).cloned()
    }

    pub fn device_scoped(&self, tenant_id: Uuid, id: Uuid) -> Option<Device> {
        read(&self.devices)
            .get(id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
    }

    pub fn device_by_unique_id(&self, unique_id: &str) -> Option<Device> {
        let index = read(&self.devices);
        index
            .unique_id_owner(unique_id)
            .and_then(|id| index.get(id))
            .cloned()
    }

    pub fn device_by_traccar_id(&self, traccar_id: i64) -> Option<Device> {
        let index = read(&self.devices);
        index
            .traccar_id_owner(traccar_id)
            .and_then(|id| index.get(id))
            .cloned()
    }

    pub fn list_devices(&self, tenant_id: Uuid) -> Vec<Device> {
        read(&self.devices).list_by_tenant(tenant_id)
    }

    /// Devices linked to any of `vehicle_ids`, in vehicle order.
    pub fn devices_for_vehicles(&self, vehicle_ids: &[Uuid]) -> Vec<Device> {
        let index = read(&self.devices);
        vehicle_ids
            .iter()
            .flat_map(|vehicle_id| index.linked_to(*vehicle_id))
            .collect()
    }
}
