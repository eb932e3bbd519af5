//! Library schema
//!
//! Two tables: `documents` holds one row per uploaded PDF, `annotations`
//! holds notes and highlights keyed by document and page. Removing a
//! document removes its annotations through `ON DELETE CASCADE`, which
//! SQLite only enforces on connections with `foreign_keys` switched on.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "documents and annotations",
    sql: include_str!("migrations/001_initial_schema.sql"),
}];

/// Bring the library schema up to the latest version
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    // Pools built by `create_pool` already set this; bare test pools do not
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_versions (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    let from = schema_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        tracing::debug!("Library schema is current at version {}", from);
        return Ok(());
    }

    for migration in pending {
        let mut tx = pool.begin().await?;

        // include_str! keeps the file as one string; sqlx runs one statement per query
        for statement in migration.sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO schema_versions (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            "Library schema migrated to version {} ({})",
            migration.version,
            migration.name
        );
    }

    Ok(())
}

/// Highest applied schema version, 0 for an empty database
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_versions")
        .fetch_one(pool)
        .await?;
    Ok(version)
}
