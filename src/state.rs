use std::sync::Arc;

use crate::access::AccessResolver;
use crate::alerts::AlertStore;
use crate::config::Config;
use crate::directory::DirectoryStore;
use crate::events::EventConfigStore;
use crate::mirrors::MirrorRegistry;
use crate::snapshot::SnapshotError;
use crate::sync::SyncQueue;
use crate::telemetry::TelemetryGateway;
use crate::tenants::TenantRegistry;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub directory: DirectoryStore,
    pub tenants: TenantRegistry,
    pub mirrors: MirrorRegistry,
    pub event_config: EventConfigStore,
    pub alerts: AlertStore,
    pub telemetry: Arc<dyn TelemetryGateway>,
}

impl AppState {
    /// Load every store from the snapshots under `config.data_dir`.
    pub fn open(
        config: Config,
        sync: SyncQueue,
        telemetry: Arc<dyn TelemetryGateway>,
    ) -> Result<Self, SnapshotError> {
        let dir = config.data_dir.as_path();
        std::fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            directory: DirectoryStore::open(dir, sync)?,
            tenants: TenantRegistry::open(dir)?,
            mirrors: MirrorRegistry::open(dir)?,
            event_config: EventConfigStore::open(dir)?,
            alerts: AlertStore::open(dir)?,
            telemetry,
            config,
        })
    }

    pub fn access(&self) -> AccessResolver<'_> {
        AccessResolver::new(&self.directory, &self.tenants, &self.mirrors)
    }
}
