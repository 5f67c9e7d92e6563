//! OrderSync Daemon - Background order reconciliation service
//!
//! This binary runs as a long-lived service and handles:
//! - Quick (invoice-only) and full reconciliation cadences
//! - Logging of sync outcomes published on the event bus
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the order database, wires the courier adapter and the
//! store into a `SyncEngine`, and hands the engine to a `SyncScheduler`.
//! Both the scheduler and the event logger observe a `CancellationToken`
//! that is cancelled on receipt of SIGTERM or SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use ordersync_core::config::{Config, LoggingConfig};
use ordersync_courier::{client::CourierClient, provider::HttpCourierApi};
use ordersync_store::{DatabasePool, SqliteOrderStore};
use ordersync_sync::{EventSubscription, SyncEngine, SyncEvent, SyncScheduler};

/// Environment variable overriding the configuration file location
const CONFIG_ENV: &str = "ORDERSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration, the database and the shutdown token
struct DaemonService {
    config: Config,
    store: SqliteOrderStore,
    /// Kept so the pool outlives every store handle
    _db_pool: DatabasePool,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the configured database
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = &config.store.database_path;
        let db_pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let store = SqliteOrderStore::new(db_pool.pool().clone());

        Ok(Self {
            config,
            store,
            _db_pool: db_pool,
            shutdown,
        })
    }

    /// Wires the courier adapter and the store into an engine
    fn build_engine(&self) -> Result<SyncEngine> {
        let client = CourierClient::with_base_url(&self.config.courier.base_url, self.config.courier.timeout())
            .context("Failed to create courier client")?;
        let courier = Arc::new(HttpCourierApi::new(client));
        let store = Arc::new(self.store.clone());

        SyncEngine::new(store.clone(), courier, store.clone(), store, &self.config)
            .context("Failed to create sync engine")
    }

    /// Runs the scheduler until shutdown
    async fn run(&self) -> Result<()> {
        let engine = Arc::new(self.build_engine()?);

        let events = engine.events().subscribe();
        let event_task = tokio::spawn(log_events(events, self.shutdown.clone()));

        let (scheduler, _handle) =
            SyncScheduler::new(Arc::clone(&engine), &self.config.sync, self.shutdown.clone());

        info!(
            partner = %engine.partner(),
            base_url = %self.config.courier.base_url,
            "Sync scheduler running"
        );
        scheduler.run().await;

        if let Err(e) = event_task.await {
            warn!(error = %e, "Event logger task failed");
        }
        Ok(())
    }
}

/// Logs every sync event until shutdown
async fn log_events(mut events: EventSubscription, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(SyncEvent::PassCompleted(result)) => {
                    info!(
                        pass_id = %result.pass_id,
                        trigger = %result.trigger,
                        actor = %result.actor,
                        state = %result.state,
                        updated = result.orders_updated,
                        errors = result.errors.len(),
                        "Pass completed"
                    );
                }
                Some(SyncEvent::InvoiceLinked(link)) => {
                    info!(invoice_id = %link.invoice_id, orders = link.order_ids.len(), "Invoice linked");
                }
                Some(SyncEvent::OrdersDeleted { order_ids }) => {
                    info!(orders = order_ids.len(), "Orders removed after disappearing remotely");
                }
                None => {
                    debug!("Event bus closed");
                    break;
                }
            },
        }
    }
}

// ============================================================================
// Configuration and logging
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

/// Loads and validates the configuration; a missing file yields defaults
fn load_config() -> Result<Config> {
    let path = config_path();
    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), path.display());
    }

    Ok(config)
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "OrderSync daemon cannot start");
            return Err(e);
        }
    };
    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "OrderSync daemon starting (ordersyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("OrderSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "OrderSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ordersync_core::config::ConfigBuilder;

    use super::*;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        ConfigBuilder::new()
            .store_database_path(dir.path().join("data").join("orders.db"))
            .courier_base_url("http://127.0.0.1:9")
            .build()
    }

    #[tokio::test]
    async fn test_service_opens_database_and_builds_engine() {
        let dir = tempfile::tempdir().unwrap();
        let service = DaemonService::new(temp_config(&dir), CancellationToken::new())
            .await
            .unwrap();

        let engine = service.build_engine().unwrap();
        assert_eq!(engine.partner().as_str(), "alwaseet");
        assert!(dir.path().join("data").join("orders.db").exists());
    }

    #[tokio::test]
    async fn test_invalid_partner_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        config.courier.partner = "   ".to_string();
        let service = DaemonService::new(config, CancellationToken::new()).await.unwrap();

        assert!(service.build_engine().is_err());
    }

    #[tokio::test]
    async fn test_run_returns_after_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let service = DaemonService::new(temp_config(&dir), shutdown.clone())
            .await
            .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .expect("daemon did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_logger_stops_on_shutdown() {
        let bus = ordersync_sync::SyncEventBus::default();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(log_events(bus.subscribe(), shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
