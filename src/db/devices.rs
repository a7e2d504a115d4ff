use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{Attributes, Device};

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: Uuid,
    tenant_id: Uuid,
    unique_id: String,
    traccar_id: Option<i64>,
    name: Option<String>,
    vehicle_id: Option<Uuid>,
    chip_id: Option<Uuid>,
    attributes: Json<Attributes>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            unique_id: row.unique_id,
            traccar_id: row.traccar_id,
            name: row.name,
            vehicle_id: row.vehicle_id,
            chip_id: row.chip_id,
            attributes: row.attributes.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Device>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Device::from).collect())
}

pub async fn upsert(pool: &PgPool, device: &Device) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO devices (id, tenant_id, unique_id, traccar_id, name, vehicle_id, chip_id, attributes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE
         SET tenant_id = $2, unique_id = $3, traccar_id = $4, name = $5, vehicle_id = $6,
             chip_id = $7, attributes = $8, updated_at = $10",
    )
    .bind(device.id)
    .bind(device.tenant_id)
    .bind(&device.unique_id)
    .bind(device.traccar_id)
    .bind(&device.name)
    .bind(device.vehicle_id)
    .bind(device.chip_id)
    .bind(Json(&device.attributes))
    .bind(device.created_at)
    .bind(device.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM devices WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
