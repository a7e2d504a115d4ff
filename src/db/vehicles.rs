use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Vehicle, VehicleStatus};

#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    tenant_id: Uuid,
    plate: String,
    model: String,
    brand: Option<String>,
    vehicle_type: String,
    status: String,
    device_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            plate: row.plate,
            model: row.model,
            brand: row.brand,
            vehicle_type: row.vehicle_type,
            status: VehicleStatus::parse(&row.status),
            device_id: row.device_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Vehicle>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VehicleRow>("SELECT * FROM vehicles ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Vehicle::from).collect())
}

pub async fn upsert(pool: &PgPool, vehicle: &Vehicle) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO vehicles (id, tenant_id, plate, model, brand, vehicle_type, status, device_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE
         SET tenant_id = $2, plate = $3, model = $4, brand = $5, vehicle_type = $6,
             status = $7, device_id = $8, updated_at = $10",
    )
    .bind(vehicle.id)
    .bind(vehicle.tenant_id)
    .bind(&vehicle.plate)
    .bind(&vehicle.model)
    .bind(&vehicle.brand)
    .bind(&vehicle.vehicle_type)
    .bind(vehicle.status.as_str())
    .bind(vehicle.device_id)
    .bind(vehicle.created_at)
    .bind(vehicle.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM vehicles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
