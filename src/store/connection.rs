//! Durable store connection management.
//!
//! One SQLite file per graph instance, WAL journal mode, foreign keys
//! on. Opening a preexisting file is backward-compatible because
//! migrations use `CREATE TABLE IF NOT EXISTS`.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;

/// Default on-disk path. Falls back to a temp directory when the
/// parent can't be created (e.g. no `/persistent` mount on this host).
pub const DEFAULT_DB_PATH: &str = "/persistent/task-graph/task-graph.db";

#[derive(Debug, Error)]
pub enum StoreConnectionError {
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    #[error("failed to create database directory: {0}")]
    DirectoryCreation(#[source] std::io::Error),
    #[error("failed to open connection pool: {0}")]
    Pool(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_connections: 5, acquire_timeout: Duration::from_secs(5) }
    }
}

/// Open (or create) the graph's SQLite file at `preferred_path`,
/// falling back to a temp directory if the preferred location isn't
/// writable.
pub async fn open_store(preferred_path: &str, config: PoolConfig) -> Result<SqlitePool, StoreConnectionError> {
    match try_open(preferred_path, &config).await {
        Ok(pool) => Ok(pool),
        Err(_) => {
            let fallback = std::env::temp_dir().join("task-graph").join("task-graph.db");
            let fallback = fallback.to_string_lossy().into_owned();
            tracing::warn!(preferred_path, fallback, "falling back to temp directory for task graph store");
            try_open(&fallback, &config).await
        }
    }
}

async fn try_open(path: &str, config: &PoolConfig) -> Result<SqlitePool, StoreConnectionError> {
    ensure_parent_dir(path)?;

    let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
        .map_err(|_| StoreConnectionError::InvalidUrl(path.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(StoreConnectionError::Pool)
}

/// Open an in-memory store for tests: single connection, shared cache,
/// same pragmas as production otherwise.
pub async fn open_test_store() -> Result<SqlitePool, StoreConnectionError> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|_| StoreConnectionError::InvalidUrl("sqlite::memory:".to_string()))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .shared_cache(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .map_err(StoreConnectionError::Pool)
}

fn ensure_parent_dir(path: &str) -> Result<(), StoreConnectionError> {
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(StoreConnectionError::DirectoryCreation)?;
        }
    }
    Ok(())
}
