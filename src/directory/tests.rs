use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::*;
use crate::models::{DeviceChanges, NewDevice, NewVehicle, VehicleChanges};
use tempfile::TempDir;
use crate::sync::{DirectorySync, RelationalSnapshot, SyncCommand};

fn store() -> (DirectoryStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (DirectoryStore::open(dir.path(), SyncQueue::disabled()).unwrap(), dir)
}

fn new_vehicle(plate: &str) -> NewVehicle {
    NewVehicle {
        plate: plate.to_string(),
        model: "Actros".to_string(),
        brand: Some("Mercedes".to_string()),
        vehicle_type: "truck".to_string(),
        ..Default::default()
    }
}

fn new_device(unique_id: &str, traccar_id: Option<i64>) -> NewDevice {
    NewDevice {
        unique_id: unique_id.to_string(),
        traccar_id,
        ..Default::default()
    }
}

#[test]
fn scoped_lookup_hides_other_tenants_but_raw_lookup_does_not() {
    let (store, _dir) = store();
    let tenant_a = Uuid::now_v7();
    let tenant_b = Uuid::now_v7();
    let vehicle = store.create_vehicle(tenant_a, new_vehicle("AAA-0001")).unwrap();

    assert!(store.vehicle_scoped(tenant_b, vehicle.id).is_none());
    assert_eq!(store.vehicle_scoped(tenant_a, vehicle.id), Some(vehicle.clone()));
    assert_eq!(store.vehicle_by_id(vehicle.id), Some(vehicle));
}

#[test]
fn vehicle_requires_plate_model_and_type() {
    let (store, _dir) = store();
    let mut new = new_vehicle("  ");
    assert!(matches!(
        store.create_vehicle(Uuid::now_v7(), new.clone()),
        Err(DirectoryError::Validation(_))
    ));
    new.plate = "ABC-1234".to_string();
    new.vehicle_type = String::new();
    assert!(matches!(
        store.create_vehicle(Uuid::now_v7(), new),
        Err(DirectoryError::Validation(_))
    ));
}

#[test]
fn plate_is_unique_per_tenant_ignoring_case() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let first = store.create_vehicle(tenant, new_vehicle("abc-1234")).unwrap();

    match store.create_vehicle(tenant, new_vehicle("ABC-1234")) {
        Err(DirectoryError::Conflict { existing_id, .. }) => assert_eq!(existing_id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }

    // Another tenant may use the same plate.
    assert!(store.create_vehicle(Uuid::now_v7(), new_vehicle("ABC-1234")).is_ok());
}

#[test]
fn plate_change_is_revalidated_and_reindexed() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let a = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    let b = store.create_vehicle(tenant, new_vehicle("BBB-0002")).unwrap();

    let clash = store.update_vehicle(
        tenant,
        b.id,
        VehicleChanges {
            plate: Some("aaa-0001".to_string()),
            ..Default::default()
        },
    );
    assert!(matches!(clash, Err(DirectoryError::Conflict { existing_id, .. }) if existing_id == a.id));

    let renamed = store
        .update_vehicle(
            tenant,
            a.id,
            VehicleChanges {
                plate: Some("CCC-0003".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.plate, "CCC-0003");
    assert!(store.vehicle_by_plate(tenant, "aaa-0001").is_none());
    assert_eq!(store.vehicle_by_plate(tenant, "ccc-0003").map(|v| v.id), Some(a.id));

    // The freed plate can be taken again.
    assert!(store.create_vehicle(tenant, new_vehicle("AAA-0001")).is_ok());
}

#[test]
fn update_of_foreign_vehicle_is_not_found() {
    let (store, _dir) = store();
    let vehicle = store.create_vehicle(Uuid::now_v7(), new_vehicle("AAA-0001")).unwrap();
    let result = store.update_vehicle(Uuid::now_v7(), vehicle.id, VehicleChanges::default());
    assert!(matches!(result, Err(DirectoryError::NotFound("Vehicle"))));
}

#[test]
fn device_unique_id_conflict_ignores_case() {
    let (store, _dir) = store();
    let first = store.create_device(Uuid::now_v7(), new_device("ab12CD", None)).unwrap();

    match store.create_device(Uuid::now_v7(), new_device("AB12cd", None)) {
        Err(DirectoryError::Conflict { existing_id, .. }) => assert_eq!(existing_id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn device_requires_unique_id_and_unique_traccar_id() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    assert!(matches!(
        store.create_device(tenant, new_device("", None)),
        Err(DirectoryError::Validation(_))
    ));

    let first = store.create_device(tenant, new_device("imei-1", Some(42))).unwrap();
    let second = store.create_device(tenant, new_device("imei-2", Some(42)));
    assert!(matches!(second, Err(DirectoryError::Conflict { existing_id, .. }) if existing_id == first.id));
    assert_eq!(store.device_by_traccar_id(42).map(|d| d.id), Some(first.id));
}

#[test]
fn tracking_id_can_be_cleared_and_reused() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let first = store.create_device(tenant, new_device("imei-a", Some(55))).unwrap();
    let second = store.create_device(tenant, new_device("imei-b", None)).unwrap();

    match store.update_device(
        tenant,
        second.id,
        DeviceChanges { traccar_id: Some(Some(55)), ..Default::default() },
    ) {
        Err(DirectoryError::Conflict { existing_id, .. }) => assert_eq!(existing_id, first.id),
        other => panic!("expected conflict, got {other:?}"),
    }

    let cleared = store
        .update_device(
            tenant,
            first.id,
            DeviceChanges { traccar_id: Some(None), ..Default::default() },
        )
        .unwrap();
    assert_eq!(cleared.traccar_id, None);
    assert!(store.device_by_traccar_id(55).is_none());

    // A missing field leaves the id alone.
    let renamed = store
        .update_device(
            tenant,
            second.id,
            DeviceChanges { name: Some("Spare".to_string()), ..Default::default() },
        )
        .unwrap();
    assert_eq!(renamed.traccar_id, None);

    let moved = store
        .update_device(
            tenant,
            second.id,
            DeviceChanges { traccar_id: Some(Some(55)), ..Default::default() },
        )
        .unwrap();
    assert_eq!(store.device_by_traccar_id(55).map(|d| d.id), Some(moved.id));
}

#[test]
fn relinking_moves_both_sides() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let v1 = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    let v2 = store.create_vehicle(tenant, new_vehicle("BBB-0002")).unwrap();
    let d1 = store.create_device(tenant, new_device("imei-1", Some(1))).unwrap();
    let d2 = store.create_device(tenant, new_device("imei-2", Some(2))).unwrap();

    store.link_device(tenant, d1.id, v1.id).unwrap();
    assert_eq!(store.vehicle_by_id(v1.id).unwrap().device_id, Some(d1.id));

    // Move d1 to v2: v1 loses its device.
    store.link_device(tenant, d1.id, v2.id).unwrap();
    assert_eq!(store.vehicle_by_id(v1.id).unwrap().device_id, None);
    assert_eq!(store.vehicle_by_id(v2.id).unwrap().device_id, Some(d1.id));
    assert!(store.devices_for_vehicles(&[v1.id]).is_empty());

    // Put d2 on v2: d1 loses its vehicle.
    store.link_device(tenant, d2.id, v2.id).unwrap();
    assert_eq!(store.device_by_id(d1.id).unwrap().vehicle_id, None);
    let linked: Vec<Uuid> = store.devices_for_vehicles(&[v2.id]).iter().map(|d| d.id).collect();
    assert_eq!(linked, vec![d2.id]);
}

#[test]
fn link_across_tenants_is_not_found() {
    let (store, _dir) = store();
    let vehicle = store.create_vehicle(Uuid::now_v7(), new_vehicle("AAA-0001")).unwrap();
    let tenant = Uuid::now_v7();
    let device = store.create_device(tenant, new_device("imei-1", None)).unwrap();
    assert!(matches!(
        store.link_device(tenant, device.id, vehicle.id),
        Err(DirectoryError::NotFound("Vehicle"))
    ));
}

#[test]
fn unlink_is_idempotent() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let vehicle = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    let mut new = new_device("imei-1", Some(7));
    new.chip_id = Some(Uuid::now_v7());
    let device = store.create_device(tenant, new).unwrap();
    store.link_device(tenant, device.id, vehicle.id).unwrap();

    let once = store.unlink_device(tenant, device.id).unwrap();
    assert_eq!(once.vehicle_id, None);
    assert_eq!(once.chip_id, None);
    assert_eq!(store.vehicle_by_id(vehicle.id).unwrap().device_id, None);

    let twice = store.unlink_device(tenant, device.id).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn deleting_vehicle_clears_device_link_and_indexes() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let vehicle = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    let device = store.create_device(tenant, new_device("imei-1", None)).unwrap();
    store.link_device(tenant, device.id, vehicle.id).unwrap();

    store.delete_vehicle(tenant, vehicle.id).unwrap();

    assert!(store.vehicle_by_id(vehicle.id).is_none());
    assert!(store.vehicle_by_plate(tenant, "AAA-0001").is_none());
    assert!(store.list_vehicles(tenant).is_empty());
    assert_eq!(store.device_by_id(device.id).unwrap().vehicle_id, None);
}

#[test]
fn deleting_device_frees_unique_id() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let device = store.create_device(tenant, new_device("imei-1", Some(9))).unwrap();
    store.delete_device(tenant, device.id).unwrap();

    assert!(store.device_by_unique_id("IMEI-1").is_none());
    assert!(store.device_by_traccar_id(9).is_none());
    assert!(store.create_device(tenant, new_device("IMEI-1", Some(9))).is_ok());
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let tenant = Uuid::now_v7();
    let (vehicle, device) = {
        let store = DirectoryStore::open(dir.path(), SyncQueue::disabled()).unwrap();
        let vehicle = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
        let device = store.create_device(tenant, new_device("imei-1", Some(3))).unwrap();
        let device = store.link_device(tenant, device.id, vehicle.id).unwrap();
        (store.vehicle_by_id(vehicle.id).unwrap(), device)
    };

    let reopened = DirectoryStore::open(dir.path(), SyncQueue::disabled()).unwrap();
    assert_eq!(reopened.list_vehicles(tenant), vec![vehicle]);
    assert_eq!(reopened.device_by_unique_id("IMEI-1"), Some(device));
}

#[test]
fn reconcile_prefers_relational_records() {
    let (store, _dir) = store();
    let tenant = Uuid::now_v7();
    let local = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    let local_only = store.create_vehicle(tenant, new_vehicle("BBB-0002")).unwrap();

    let mut remote = local.clone();
    remote.model = "Axor".to_string();
    let remote_only = Vehicle {
        id: Uuid::now_v7(),
        plate: "CCC-0003".to_string(),
        created_at: Utc::now(),
        ..local.clone()
    };

    store
        .reconcile(vec![remote.clone(), remote_only.clone()], vec![])
        .unwrap();

    assert_eq!(store.vehicle_by_id(local.id).unwrap().model, "Axor");
    assert!(store.vehicle_by_id(local_only.id).is_some());
    assert!(store.vehicle_by_id(remote_only.id).is_some());
    assert_eq!(store.list_vehicles(tenant).len(), 3);
}

struct FailingSync;

#[async_trait]
impl DirectorySync for FailingSync {
    async fn apply(&self, _command: &SyncCommand) -> Result<(), sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn load(&self) -> Result<Option<RelationalSnapshot>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }
}

#[tokio::test]
async fn relational_failures_do_not_reach_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, worker) = SyncQueue::spawn(Arc::new(FailingSync));
    let store = DirectoryStore::open(dir.path(), queue).unwrap();
    let tenant = Uuid::now_v7();

    let vehicle = store.create_vehicle(tenant, new_vehicle("AAA-0001")).unwrap();
    assert_eq!(store.vehicle_scoped(tenant, vehicle.id), Some(vehicle.clone()));

    drop(store);
    worker.await.unwrap();

    let reopened = DirectoryStore::open(dir.path(), SyncQueue::disabled()).unwrap();
    assert_eq!(reopened.vehicle_by_id(vehicle.id), Some(vehicle));
}
