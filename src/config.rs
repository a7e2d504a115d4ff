use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Directory holding the local snapshot files.
    pub data_dir: PathBuf,
    /// Relational persistence layer. Without it directory changes stay local.
    pub database_url: Option<String>,
    /// Tracking backend database (`postgres://` or `mysql://`).
    pub traccar_database_url: Option<String>,
    pub traccar_query_timeout: Duration,
    /// Maximum events fetched per live-event query.
    pub event_limit: i64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host: IpAddr = env_or("FLEETSCOPE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid FLEETSCOPE_HOST: {e}"))?;

        let port: u16 = env_or("FLEETSCOPE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FLEETSCOPE_PORT: {e}"))?;

        let data_dir = PathBuf::from(env_or("FLEETSCOPE_DATA_DIR", "./data"));

        let traccar_query_timeout: u64 = env_or("TRACCAR_QUERY_TIMEOUT_SECS", "15")
            .parse()
            .map_err(|e| format!("Invalid TRACCAR_QUERY_TIMEOUT_SECS: {e}"))?;

        let event_limit: i64 = env_or("FLEETSCOPE_EVENT_LIMIT", "500")
            .parse()
            .map_err(|e| format!("Invalid FLEETSCOPE_EVENT_LIMIT: {e}"))?;
        if event_limit <= 0 {
            return Err("FLEETSCOPE_EVENT_LIMIT must be positive".to_string());
        }

        let log_level = env_or("FLEETSCOPE_LOG_LEVEL", "info");

        Ok(Config {
            host,
            port,
            data_dir,
            database_url: env_optional("DATABASE_URL"),
            traccar_database_url: env_optional("TRACCAR_DATABASE_URL"),
            traccar_query_timeout: Duration::from_secs(traccar_query_timeout),
            event_limit,
            log_level,
        })
    }

    /// Settings for a process that keeps everything local, rooted at `data_dir`.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            data_dir: data_dir.into(),
            database_url: None,
            traccar_database_url: None,
            traccar_query_timeout: Duration::from_secs(15),
            event_limit: 500,
            log_level: "info".to_string(),
        }
    }
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
