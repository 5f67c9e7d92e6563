//! OrderSync Store - SQLite persistence
//!
//! SQLite-backed adapters for the persistence ports of `ordersync-core`:
//! - [`IOrderStore`](ordersync_core::ports::IOrderStore) over the `orders` table
//! - [`ITokenStore`](ordersync_core::ports::ITokenStore) over `delivery_account_tokens`
//! - [`IUserDirectory`](ordersync_core::ports::IUserDirectory) over `user_roles`
//!
//! The UI writes the same database, so every engine write is a single-row
//! statement.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use ordersync_store::{DatabasePool, SqliteOrderStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/ordersync/orders.db")).await?;
//! let store = SqliteOrderStore::new(pool.pool().clone());
//! // Use store as IOrderStore / ITokenStore / IUserDirectory...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteOrderStore;

/// Failures of the SQLite adapter
///
/// Surfaced to the engine as `StoreError::Backend`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot create database directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open database {location}: {source}")]
    Open {
        location: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("schema migration failed: {0}")]
    Migration(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// A stored column could not be turned back into a domain value
    #[error("corrupt {column} column: {reason}")]
    Decode { column: &'static str, reason: String },
}

impl CacheError {
    pub(crate) fn decode(column: &'static str, reason: impl ToString) -> Self {
        CacheError::Decode {
            column,
            reason: reason.to_string(),
        }
    }
}
