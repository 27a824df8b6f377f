//! # Schema Migrations
//!
//! The schema is a single `records` table plus its indexes; migrations are
//! compiled into the binary and applied when a store opens.
//!
//! ```text
//! SqliteStore::new ──► _sqlx_migrations ──► 001_records.sql ✓ applied
//!                                           002_….sql       ⬜ run now
//! ```
//!
//! New migrations go in `migrations/sqlite/` as `NNN_description.sql`.
//! Applied files are checksummed, so edit history by adding files only.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::StoreResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
    MIGRATOR.run(pool).await?;
    info!(available = MIGRATOR.migrations.len(), "Record store schema is current");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> StoreResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use crate::pool::{DbConfig, SqliteStore};

    #[tokio::test]
    async fn test_migrations_are_applied_once() {
        let store = SqliteStore::new(DbConfig::in_memory()).await.unwrap();
        store.run_migrations().await.unwrap();

        let (total, applied) = super::migration_status(store.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }
}
