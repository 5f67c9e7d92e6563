//! SQLite pool for the order database
//!
//! The application UI writes the same file, so file databases run in WAL mode
//! with a busy timeout. The schema is applied on every open; each statement
//! is `IF NOT EXISTS`.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20260301_initial.sql");

/// Connections kept for a file database
const FILE_MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Owner of the SQLite connection pool
///
/// Store handles clone the inner [`SqlitePool`]; keep this value alive for as
/// long as they are in use.
#[derive(Debug)]
pub struct DatabasePool {
    pool: SqlitePool,
    in_memory: bool,
}

impl DatabasePool {
    /// Opens the database file, creating it and its directory when missing
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                location: db_path.display().to_string(),
                source,
            })?;

        apply_schema(&pool).await?;
        info!(path = %db_path.display(), "Order database opened");

        Ok(Self {
            pool,
            in_memory: false,
        })
    }

    /// Private in-memory database
    ///
    /// Limited to one connection since every SQLite memory connection is its
    /// own database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|source| CacheError::Open {
                location: ":memory:".to_string(),
                source,
            })?;

        apply_schema(&pool).await?;
        debug!("In-memory order database ready");

        Ok(Self {
            pool,
            in_memory: true,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Waits for checked-out connections and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(CacheError::Migration)?;
    debug!("Order database schema applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(db: &DatabasePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_pool_has_schema() {
        let db = DatabasePool::in_memory().await.unwrap();
        assert!(db.is_in_memory());

        let tables = table_names(&db).await;
        for table in ["delivery_account_tokens", "orders", "user_roles"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_dirs_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("orders.db");

        let first = DatabasePool::new(&path).await.unwrap();
        assert!(!first.is_in_memory());
        first.close().await;
        assert!(path.exists());

        let second = DatabasePool::new(&path).await.unwrap();
        assert_eq!(table_names(&second).await.len(), 3);
        second.close().await;
    }
}
