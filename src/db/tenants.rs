use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ClientType, TenantProfile};

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    client_type: String,
    created_at: DateTime<Utc>,
}

impl From<TenantRow> for TenantProfile {
    fn from(row: TenantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            client_type: ClientType::parse(&row.client_type),
            created_at: row.created_at,
        }
    }
}

pub async fn list(pool: &PgPool) -> Result<Vec<TenantProfile>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TenantRow>("SELECT * FROM tenants ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(TenantProfile::from).collect())
}
