use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use fleetscope::config::Config;
use fleetscope::state::{AppState, SharedState};
use fleetscope::sync::{DirectorySync, NoopSync, PgDirectorySync, SyncQueue};
use fleetscope::telemetry::{SqlTelemetryGateway, TelemetryGateway, UnavailableGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting Fleetscope");

    let sync = relational_sync(&config).await?;
    let (queue, sync_worker) = SyncQueue::spawn(sync.clone());

    let telemetry: Arc<dyn TelemetryGateway> = match &config.traccar_database_url {
        Some(url) => Arc::new(SqlTelemetryGateway::connect_lazy(
            url,
            config.traccar_query_timeout,
        )?),
        None => {
            tracing::warn!("TRACCAR_DATABASE_URL not set, telemetry endpoints will report unavailable");
            Arc::new(UnavailableGateway)
        }
    };

    let addr = SocketAddr::new(config.host, config.port);
    let state: SharedState = Arc::new(AppState::open(config, queue, telemetry)?);

    // Relational records win over the local snapshot when both exist.
    match sync.load().await {
        Ok(Some(remote)) => {
            state.tenants.upsert_many(remote.tenants)?;
            state.directory.reconcile(remote.vehicles, remote.devices)?;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Relational layer unreachable, serving local snapshot: {e}"),
    }

    let app = fleetscope::build_app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the sync worker drain what is still queued.
    drop(state);
    if let Err(e) = sync_worker.await {
        tracing::error!("Relational sync worker failed: {e}");
    }

    Ok(())
}

/// Postgres-backed sync when `DATABASE_URL` is set. An unreachable database is
/// not fatal: the pool connects lazily and the local snapshot stays authoritative.
async fn relational_sync(
    config: &Config,
) -> Result<Arc<dyn DirectorySync>, Box<dyn std::error::Error>> {
    let Some(url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, directory changes stay local");
        return Ok(Arc::new(NoopSync));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(url)?;

    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(()) => tracing::info!("Migrations applied"),
        Err(e) => tracing::warn!("Could not run migrations: {e}"),
    }

    Ok(Arc::new(PgDirectorySync::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
