use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::FromRow;

use super::{Dialect, TelemetryError, TelemetryGateway};
use crate::models::{Attributes, Position, TelemetryEvent};

const MAX_CONNECTIONS: u32 = 5;

enum TrackingPool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

enum Bind {
    Int(i64),
    Time(NaiveDateTime),
}

/// Gateway over the tracking backend's own tables (`tc_positions`, `tc_events`, `tc_devices`).
pub struct SqlTelemetryGateway {
    pool: TrackingPool,
    dialect: Dialect,
    timeout: Duration,
}

impl SqlTelemetryGateway {
    /// Build a lazily-connecting gateway; the backend is not contacted until the first query.
    pub fn connect_lazy(url: &str, timeout: Duration) -> Result<Self, String> {
        let dialect = Dialect::from_url(url)
            .ok_or_else(|| "TRACCAR_DATABASE_URL must be a postgres:// or mysql:// URL".to_string())?;

        let pool = match dialect {
            Dialect::Postgres => PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(timeout)
                .connect_lazy(url)
                .map(TrackingPool::Postgres),
            Dialect::MySql => MySqlPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(timeout)
                .connect_lazy(url)
                .map(TrackingPool::MySql),
        }
        .map_err(|e| format!("Invalid TRACCAR_DATABASE_URL: {e}"))?;

        Ok(Self {
            pool,
            dialect,
            timeout,
        })
    }

    async fn fetch_rows<T>(&self, sql: &str, binds: &[Bind]) -> Result<Vec<T>, TelemetryError>
    where
        T: for<'r> FromRow<'r, PgRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let query = async {
            match &self.pool {
                TrackingPool::Postgres(pool) => {
                    let mut query = sqlx::query_as::<_, T>(sql);
                    for bind in binds {
                        query = match bind {
                            Bind::Int(v) => query.bind(*v),
                            Bind::Time(t) => query.bind(*t),
                        };
                    }
                    query.fetch_all(pool).await
                }
                TrackingPool::MySql(pool) => {
                    let mut query = sqlx::query_as::<_, T>(sql);
                    for bind in binds {
                        query = match bind {
                            Bind::Int(v) => query.bind(*v),
                            Bind::Time(t) => query.bind(*t),
                        };
                    }
                    query.fetch_all(pool).await
                }
            }
        };

        match tokio::time::timeout(self.timeout, query).await {
            Ok(rows) => rows.map_err(TelemetryError::from),
            Err(_) => {
                tracing::warn!(
                    "Tracking backend query timed out after {}s",
                    self.timeout.as_secs()
                );
                Err(TelemetryError::Unavailable(format!(
                    "query timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl TelemetryGateway for SqlTelemetryGateway {
    async fn latest_positions(&self, device_ids: &[i64]) -> Result<Vec<Position>, TelemetryError> {
        let sql = self.dialect.latest_positions_sql(device_ids.len());
        let binds: Vec<Bind> = device_ids.iter().map(|id| Bind::Int(*id)).collect();
        let rows: Vec<PositionRow> = self.fetch_rows(&sql, &binds).await?;
        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn positions(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Position>, TelemetryError> {
        let binds = [
            Bind::Int(device_id),
            Bind::Time(from.naive_utc()),
            Bind::Time(to.naive_utc()),
        ];
        let rows: Vec<PositionRow> = self.fetch_rows(&self.dialect.positions_sql(), &binds).await?;
        Ok(rows.into_iter().map(Position::from).collect())
    }

    async fn events(
        &self,
        device_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TelemetryEvent>, TelemetryError> {
        let sql = self.dialect.events_sql(device_ids.len());
        let mut binds: Vec<Bind> = device_ids.iter().map(|id| Bind::Int(*id)).collect();
        binds.push(Bind::Time(from.naive_utc()));
        binds.push(Bind::Time(to.naive_utc()));
        binds.push(Bind::Int(limit));

        let rows: Vec<EventRow> = self.fetch_rows(&sql, &binds).await?;
        Ok(rows.into_iter().map(TelemetryEvent::from).collect())
    }
}

#[derive(FromRow)]
struct PositionRow {
    id: i64,
    device_id: i64,
    protocol: Option<String>,
    fix_time: NaiveDateTime,
    server_time: NaiveDateTime,
    device_time: NaiveDateTime,
    latitude: f64,
    longitude: f64,
    speed: f64,
    course: f64,
    address: Option<String>,
    attributes: Option<String>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Position {
            id: row.id,
            device_id: row.device_id,
            protocol: row.protocol,
            fix_time: row.fix_time.and_utc(),
            server_time: row.server_time.and_utc(),
            device_time: row.device_time.and_utc(),
            latitude: row.latitude,
            longitude: row.longitude,
            speed: row.speed,
            course: row.course,
            address: row.address,
            attributes: Attributes::parse(row.attributes.as_deref()),
        }
    }
}

#[derive(FromRow)]
struct EventRow {
    id: i64,
    event_type: String,
    event_time: Option<NaiveDateTime>,
    device_id: i64,
    position_id: Option<i64>,
    geofence_id: Option<i64>,
    attributes: Option<String>,
}

impl From<EventRow> for TelemetryEvent {
    fn from(row: EventRow) -> Self {
        TelemetryEvent {
            id: row.id,
            event_type: row.event_type,
            event_time: row.event_time.map(|t| t.and_utc()),
            device_id: row.device_id,
            position_id: row.position_id.filter(|id| *id > 0),
            geofence_id: row.geofence_id.filter(|id| *id > 0),
            attributes: Attributes::parse(row.attributes.as_deref()),
        }
    }
}
