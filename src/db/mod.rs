//! Embedded SQLite stores
//!
//! Two files back the server: a mutable users store and a read-only ETF
//! reference store. Both are reached through single-connection pools, so
//! statements run one at a time.

use std::{path::Path, str::FromStr};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::errors::AppError;

pub mod etfs;
pub mod rows;
pub mod schema_guard;
pub mod users;

pub async fn connect(options: SqliteConnectOptions) -> Result<SqlitePool, AppError> {
    // An in-memory database lives only as long as its connection.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn connect_memory() -> Result<SqlitePool, AppError> {
    connect(SqliteConnectOptions::from_str("sqlite::memory:")?).await
}

pub fn file_options(path: &Path) -> Result<SqliteConnectOptions, AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::internal(format!(
                "failed to create database directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    // Rollback journal rather than WAL so the ETF file can be opened read-only
    // without sidecar files.
    Ok(SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Delete)
        .create_if_missing(true))
}
