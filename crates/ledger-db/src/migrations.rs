//! # Database Migrations
//!
//! SQL migrations embedded from `migrations/sqlite/` at build time.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   products, sales, sale_items + indexes
//! ```
//!
//! Applied migrations are recorded in `_sqlx_migrations`. Existing files are
//! never edited; schema changes go in a new, higher-numbered file.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every pending migration in filename order.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!(available = MIGRATOR.migrations.len(), "Applying migrations");

    MIGRATOR.run(pool).await?;

    info!("Migrations up to date");
    Ok(())
}

/// Returns `(total, applied)`.
///
/// A database that was never migrated reports zero applied rather than an
/// error.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
    {
        Ok(n) => n.max(0) as usize,
        Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => 0,
        Err(e) => {
            warn!(error = %e, "Could not read migration table");
            return Err(e.into());
        }
    };

    Ok((total, applied))
}
