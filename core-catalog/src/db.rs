//! # Database Connection Pool Module
//!
//! Provides SQLite connection pooling with configuration suited to the
//! catalog workload.
//!
//! ## Features
//!
//! - **WAL Mode**: Enabled for better concurrency (multiple readers, one writer)
//! - **Connection Pooling**: Configurable min/max connections with timeouts
//! - **Foreign Keys**: Enforced for referential integrity (cascade deletes)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_catalog::db::{create_pool, initialize_catalog, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("catalog.db")).await?;
//! initialize_catalog(&pool).await?;
//! ```

use crate::error::{CatalogError, Result};
use crate::repositories::{SqliteItemRepository, SqliteLibraryRepository, SqliteSubtitleRepository};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL, e.g. `sqlite:catalog.db` or `sqlite::memory:`
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a configuration for the given database file path.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration for an in-memory database (useful for testing).
    ///
    /// Capped at one connection: every new in-memory connection would see its
    /// own empty database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool.
///
/// Enables WAL journaling, foreign key enforcement and a busy timeout on
/// every connection.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the pool cannot connect.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| CatalogError::Database(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| CatalogError::Database(e.to_string()))?;

    info!(database_url = %config.database_url, "Database pool created");
    Ok(pool)
}

/// Create the catalog tables and indexes if they do not exist.
///
/// Runs the per-repository initializers in foreign-key order:
/// libraries, then items, then subtitles.
pub async fn initialize_catalog(pool: &SqlitePool) -> Result<()> {
    SqliteLibraryRepository::new(pool.clone()).initialize().await?;
    SqliteItemRepository::new(pool.clone()).initialize().await?;
    SqliteSubtitleRepository::new(pool.clone()).initialize().await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
