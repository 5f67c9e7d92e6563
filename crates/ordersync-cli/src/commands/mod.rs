//! Operator subcommands and the wiring they share

pub mod config;
pub mod reconcile;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use ordersync_core::config::Config;
use ordersync_courier::{client::CourierClient, provider::HttpCourierApi};
use ordersync_store::{DatabasePool, SqliteOrderStore};
use ordersync_sync::SyncEngine;

/// `--config` if given, the platform default otherwise
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(Config::default_path)
}

/// Loads the configuration at `path` and refuses an invalid one
pub fn load_valid_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };

    let errors = config.validate();
    if let Some(first) = errors.first() {
        anyhow::bail!(
            "{} configuration error(s) in {}, first: {}",
            errors.len(),
            path.display(),
            first
        );
    }
    Ok(config)
}

/// Engine over the configured database and courier API
///
/// The pool is returned alongside so it outlives the engine's store handles.
pub async fn open_engine(config: &Config) -> Result<(SyncEngine, DatabasePool)> {
    let db_path = &config.store.database_path;
    let pool = DatabasePool::new(db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let store = Arc::new(SqliteOrderStore::new(pool.pool().clone()));

    let client = CourierClient::with_base_url(&config.courier.base_url, config.courier.timeout())
        .context("Failed to create courier client")?;
    let courier = Arc::new(HttpCourierApi::new(client));

    let engine = SyncEngine::new(store.clone(), courier, store.clone(), store, config)
        .context("Failed to create sync engine")?;
    Ok((engine, pool))
}
