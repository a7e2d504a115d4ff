//! Access Resolver: which vehicles and devices an actor may see.
//!
//! Resolution never fails for lack of access; an empty vehicle list is a
//! valid answer and the boundary decides what a missing asset means.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::directory::DirectoryStore;
use crate::mirrors::MirrorRegistry;
use crate::models::vehicle::normalize_plate;
use crate::models::{Device, Mirror, MirrorContext, Vehicle};
use crate::tenants::TenantRegistry;

/// Authenticated caller, as supplied by the request boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: Uuid,
    pub role: String,
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Union a non-receiver's own fleet with what active mirrors grant it.
    pub include_mirrored: bool,
    pub at: DateTime<Utc>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_mirrored: false,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleAccess {
    pub vehicles: Vec<Vehicle>,
    pub mirror_owner_tenant_ids: Vec<Uuid>,
    pub is_receiver: bool,
    pub has_mirrors: bool,
    pub resolved_tenant_id: Uuid,
}

/// `VehicleAccess` plus the devices on those vehicles and their tracking ids.
#[derive(Debug, Clone, Serialize)]
pub struct AccessScope {
    #[serde(flatten)]
    pub access: VehicleAccess,
    pub devices: Vec<Device>,
    pub accessible_vehicle_ids: Vec<Uuid>,
    pub accessible_device_ids: Vec<i64>,
}

impl AccessScope {
    pub fn allows_vehicle(&self, id: Uuid) -> bool {
        self.accessible_vehicle_ids.contains(&id)
    }

    pub fn device(&self, id: Uuid) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn device_by_traccar_id(&self, traccar_id: i64) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.traccar_id == Some(traccar_id))
    }
}

pub struct AccessResolver<'a> {
    directory: &'a DirectoryStore,
    tenants: &'a TenantRegistry,
    mirrors: &'a MirrorRegistry,
}

impl<'a> AccessResolver<'a> {
    pub fn new(
        directory: &'a DirectoryStore,
        tenants: &'a TenantRegistry,
        mirrors: &'a MirrorRegistry,
    ) -> Self {
        Self {
            directory,
            tenants,
            mirrors,
        }
    }

    pub fn resolve_accessible_vehicles(
        &self,
        actor: &Actor,
        requested_tenant_id: Option<Uuid>,
        mirror_context: Option<&MirrorContext>,
        options: ResolveOptions,
    ) -> VehicleAccess {
        let resolved_tenant_id = mirror_context
            .map(|ctx| ctx.owner_tenant_id)
            .or(requested_tenant_id)
            .unwrap_or(actor.tenant_id);

        let owned = self.directory.list_vehicles(resolved_tenant_id);
        let is_receiver = self.tenants.is_receiver(actor.tenant_id);
        let active = self.mirrors.active_targeting(actor.tenant_id, options.at);
        let has_mirrors = !active.is_empty();

        let (vehicles, mirror_owner_tenant_ids) = if let Some(ctx) = mirror_context {
            // Re-check the negotiated allow-list against the owner's current fleet.
            let allowed: HashSet<Uuid> = ctx.allowed_vehicle_ids.iter().copied().collect();
            let vehicles = owned
                .into_iter()
                .filter(|v| allowed.contains(&v.id))
                .collect();
            (vehicles, vec![ctx.owner_tenant_id])
        } else if is_receiver {
            self.mirrored_vehicles(&active)
        } else if options.include_mirrored {
            let (mirrored, owners) = self.mirrored_vehicles(&active);
            (owned.into_iter().chain(mirrored).collect(), owners)
        } else {
            (owned, Vec::new())
        };

        VehicleAccess {
            vehicles: dedup_vehicles(vehicles),
            mirror_owner_tenant_ids,
            is_receiver,
            has_mirrors,
            resolved_tenant_id,
        }
    }

    /// The vehicle resolution plus matching devices and tracking-backend ids.
    pub fn resolve_scope(
        &self,
        actor: &Actor,
        requested_tenant_id: Option<Uuid>,
        mirror_context: Option<&MirrorContext>,
        options: ResolveOptions,
    ) -> AccessScope {
        let access = self.resolve_accessible_vehicles(
            actor,
            requested_tenant_id,
            mirror_context,
            options,
        );

        let accessible_vehicle_ids: Vec<Uuid> = access.vehicles.iter().map(|v| v.id).collect();

        let tenants: HashSet<Uuid> = std::iter::once(access.resolved_tenant_id)
            .chain(access.mirror_owner_tenant_ids.iter().copied())
            .collect();

        let mut seen = HashSet::new();
        let devices: Vec<Device> = self
            .directory
            .devices_for_vehicles(&accessible_vehicle_ids)
            .into_iter()
            .filter(|d| tenants.contains(&d.tenant_id))
            .filter(|d| seen.insert(d.id))
            .collect();

        let accessible_device_ids: Vec<i64> = devices
            .iter()
            .filter_map(|d| d.traccar_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        AccessScope {
            access,
            devices,
            accessible_vehicle_ids,
            accessible_device_ids,
        }
    }

    /// Union of the vehicles granted by `mirrors`, limited to each owner's current fleet.
    fn mirrored_vehicles(&self, mirrors: &[Mirror]) -> (Vec<Vehicle>, Vec<Uuid>) {
        let mut vehicles = Vec::new();
        let mut owners = Vec::new();

        for mirror in mirrors {
            if !owners.contains(&mirror.owner_tenant_id) {
                owners.push(mirror.owner_tenant_id);
            }
            vehicles.extend(
                mirror
                    .vehicle_ids
                    .iter()
                    .filter_map(|id| self.directory.vehicle_scoped(mirror.owner_tenant_id, *id)),
            );
        }

        (vehicles, owners)
    }
}

/// Drop repeated vehicles, keyed by id and then by tenant-local plate.
fn dedup_vehicles(vehicles: Vec<Vehicle>) -> Vec<Vehicle> {
    let mut ids = HashSet::new();
    let mut plates = HashSet::new();
    vehicles
        .into_iter()
        .filter(|v| {
            let plate = (v.tenant_id, normalize_plate(&v.plate));
            ids.insert(v.id) && plates.insert(plate)
        })
        .collect()
}
