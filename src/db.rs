//! SQLite connection for the document store.
//!
//! Each [`Mode`] names its own database file under `[store.<mode>]`.
//! [`open_store`] resolves that path, connects, and brings the schema up
//! to date, so every command that touches a store starts from the same
//! state.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::{Config, Mode};
use crate::migrate;

/// Crawl workers ingest concurrently; writers wait this long for the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the SQLite database at `db_path`.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open store: {}", db_path.display()))
}

/// Connect to the store configured for `mode` and apply the schema.
///
/// Returns the resolved database path alongside the pool.
pub async fn open_store(config: &Config, mode: Mode) -> Result<(PathBuf, SqlitePool)> {
    let db_path = config.store_path(mode)?;
    let pool = connect(&db_path).await?;
    migrate::run_migrations(&pool).await?;
    tracing::debug!("Opened {} store at {}", mode.as_str(), db_path.display());
    Ok((db_path, pool))
}
