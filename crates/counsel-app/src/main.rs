//! Counsel application binary - composition root.
//!
//! Ties the gateway crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open storage (WAL-mode SQLite)
//! 3. Construct the AI backend client and the in-process cache
//! 4. Start the axum REST API server

use std::path::PathBuf;
use std::sync::Arc;

use counsel_api::routes;
use counsel_api::state::AppState;
use counsel_backend::BackendClient;
use counsel_cache::MemoryCache;
use counsel_core::config::CounselConfig;
use counsel_storage::Database;

/// Expand ~ to the home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Resolve the config file path (COUNSEL_CONFIG env, or ~/.counsel/config.toml).
fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("COUNSEL_CONFIG") {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".counsel").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Counsel v{}", env!("CARGO_PKG_VERSION"));

    let config_file = config_path();
    let mut config = CounselConfig::load_or_default(&config_file);
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Env overrides for containerized deployments.
    if let Some(port) = std::env::var("COUNSEL_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
    {
        config.general.port = port;
    }
    if let Ok(base_url) = std::env::var("COUNSEL_BACKEND_URL") {
        config.backend.base_url = base_url;
    }

    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("counsel.db");
    let database = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let backend = BackendClient::new(&config.backend)
        .map_err(|e| counsel_core::error::CounselError::Backend(e.to_string()))?;
    tracing::info!(base_url = %config.backend.base_url, "AI backend client ready");

    let cache = Arc::new(MemoryCache::new());

    let state = AppState::new(config, database, Arc::new(backend), cache);

    routes::start_server(state).await?;

    Ok(())
}
