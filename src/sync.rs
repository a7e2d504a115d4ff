use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db;
use crate::models::{Device, TenantProfile, Vehicle};

/// A single directory mutation to mirror into the relational layer.
#[derive(Debug, Clone)]
pub enum SyncCommand {
    UpsertVehicle(Vehicle),
    DeleteVehicle(Uuid),
    UpsertDevice(Device),
    DeleteDevice(Uuid),
}

impl SyncCommand {
    fn describe(&self) -> String {
        match self {
            SyncCommand::UpsertVehicle(v) => format!("vehicle {} upsert", v.id),
            SyncCommand::DeleteVehicle(id) => format!("vehicle {id} delete"),
            SyncCommand::UpsertDevice(d) => format!("device {} upsert", d.id),
            SyncCommand::DeleteDevice(id) => format!("device {id} delete"),
        }
    }
}

/// Full contents of the relational layer, used to reconcile at startup.
#[derive(Debug, Default)]
pub struct RelationalSnapshot {
    pub tenants: Vec<TenantProfile>,
    pub vehicles: Vec<Vehicle>,
    pub devices: Vec<Device>,
}

#[async_trait]
pub trait DirectorySync: Send + Sync {
    async fn apply(&self, command: &SyncCommand) -> Result<(), sqlx::Error>;

    /// `None` when there is no relational layer to reconcile from.
    async fn load(&self) -> Result<Option<RelationalSnapshot>, sqlx::Error>;
}

/// Used when no relational layer is configured, and in tests.
pub struct NoopSync;

#[async_trait]
impl DirectorySync for NoopSync {
    async fn apply(&self, _command: &SyncCommand) -> Result<(), sqlx::Error> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<RelationalSnapshot>, sqlx::Error> {
        Ok(None)
    }
}

pub struct PgDirectorySync {
    pool: PgPool,
}

impl PgDirectorySync {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectorySync for PgDirectorySync {
    async fn apply(&self, command: &SyncCommand) -> Result<(), sqlx::Error> {
        match command {
            SyncCommand::UpsertVehicle(vehicle) => db::vehicles::upsert(&self.pool, vehicle).await,
            SyncCommand::DeleteVehicle(id) => db::vehicles::delete(&self.pool, *id).await,
            SyncCommand::UpsertDevice(device) => db::devices::upsert(&self.pool, device).await,
            SyncCommand::DeleteDevice(id) => db::devices::delete(&self.pool, *id).await,
        }
    }

    async fn load(&self) -> Result<Option<RelationalSnapshot>, sqlx::Error> {
        Ok(Some(RelationalSnapshot {
            tenants: db::tenants::list(&self.pool).await?,
            vehicles: db::vehicles::list_all(&self.pool).await?,
            devices: db::devices::list_all(&self.pool).await?,
        }))
    }
}

/// Fire-and-forget handle onto the background sync worker.
///
/// `push` never blocks and never reports failure to the caller; the worker
/// applies commands in order and logs whatever the relational layer rejects.
#[derive(Clone, Default)]
pub struct SyncQueue {
    tx: Option<mpsc::UnboundedSender<SyncCommand>>,
}

impl SyncQueue {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn spawn(sync: Arc<dyn DirectorySync>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SyncCommand>();

        let handle = tokio::spawn(async move {
            tracing::debug!("Relational sync worker started");
            while let Some(command) = rx.recv().await {
                if let Err(e) = sync.apply(&command).await {
                    tracing::error!("Relational sync failed for {}: {e}", command.describe());
                }
            }
            tracing::debug!("Relational sync worker stopped");
        });

        (Self { tx: Some(tx) }, handle)
    }

    pub fn push(&self, command: SyncCommand) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(command).is_err() {
            tracing::warn!("Relational sync worker is gone, dropping command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl DirectorySync for Recording {
        async fn apply(&self, command: &SyncCommand) -> Result<(), sqlx::Error> {
            self.0.lock().unwrap().push(command.describe());
            Ok(())
        }

        async fn load(&self) -> Result<Option<RelationalSnapshot>, sqlx::Error> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn worker_applies_commands_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (queue, handle) = SyncQueue::spawn(Arc::new(Recording(seen.clone())));

        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        queue.push(SyncCommand::DeleteVehicle(a));
        queue.push(SyncCommand::DeleteDevice(b));
        drop(queue);
        handle.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![format!("vehicle {a} delete"), format!("device {b} delete")]
        );
    }

    #[test]
    fn disabled_queue_swallows_commands() {
        SyncQueue::disabled().push(SyncCommand::DeleteVehicle(Uuid::now_v7()));
    }
}
