//! # Schema Migrations
//!
//! The schema ships inside the binary from `migrations/sqlite/`. Files are
//! applied in name order and recorded in `_sqlx_migrations`; an applied
//! file is never edited, a change to the ledger schema is a new file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever has not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (known, before) = migration_status(pool).await?;
    debug!(known, applied = before, "Checking ledger schema");

    MIGRATOR.run(pool).await?;

    let (_, after) = migration_status(pool).await?;
    if after > before {
        info!(applied = after - before, "Ledger schema migrated");
    }
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let embedded = MIGRATOR.migrations.len();

    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master \
         WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;
    if !tracked {
        return Ok((embedded, 0));
    }

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;
    Ok((embedded, applied as usize))
}
