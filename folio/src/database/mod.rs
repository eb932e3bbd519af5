//! Library database: documents, annotations, and the pool that serves them

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const LIBRARY_POOL_SIZE: u32 = 5;

/// Options for the library file: created on first run, WAL so readers
/// do not block the writer, and foreign keys on for the annotation cascade
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Open the library database.
///
/// The schema is migrated over a single connection that is closed before
/// the shared pool opens, so no pooled connection predates the migration.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let setup = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;
    initialize_database(&setup).await?;
    setup.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(LIBRARY_POOL_SIZE)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Library database ready at {:?}", db_path);

    Ok(pool)
}
