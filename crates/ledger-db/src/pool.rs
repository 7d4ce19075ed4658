//! # Database Pool Management
//!
//! Opens the SQLite file behind [`SqliteStore`].
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  LedgerConfig (engine) ──► DbConfig::new(path)                         │
//! │                                 .max_connections(n)                     │
//! │                                 .connect_timeout(t)                     │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                           Database::new(config).await                  │
//! │                             ├── open / create file (WAL, FKs on)       │
//! │                             ├── build SqlitePool                       │
//! │                             └── apply embedded migrations              │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                           db.store() ──► SqliteStore                   │
//! │                                                                         │
//! │  A transaction pins one pooled connection until commit/rollback.       │
//! │  Waiting for a connection is bounded by `connect_timeout`; waiting     │
//! │  for another writer's lock is bounded by `busy_timeout`.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Journal
//! WAL mode: reports keep reading while a sale commits.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::store::SqliteStore;

/// Path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// SQLite connection settings.
///
/// ## Example
/// ```rust
/// use ledger_db::DbConfig;
/// use std::time::Duration;
///
/// let config = DbConfig::new("./stockledger.db")
///     .max_connections(4)
///     .connect_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_connections, 4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database file, or `:memory:`.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections. Default: 5.
    pub max_connections: u32,

    /// Connections kept open while idle. Default: 1.
    pub min_connections: u32,

    /// Longest wait for a free pooled connection. Default: 30 s.
    pub connect_timeout: Duration,

    /// Longest wait for another connection's write lock. Default: 5 s.
    pub busy_timeout: Duration,

    /// Idle connections above `min_connections` close after this. Default: 10 min.
    pub idle_timeout: Duration,

    /// Apply pending migrations while connecting. Default: true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// Settings for a database file, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Settings for a private in-memory database.
    ///
    /// Every SQLite connection to `:memory:` sees its own empty database,
    /// so the pool is pinned to exactly one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// True when this configuration opens `:memory:`.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    /// Sets the pool size. Ignored for in-memory databases.
    pub fn max_connections(mut self, max: u32) -> Self {
        if !self.is_in_memory() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Owns the SQLite pool and hands out [`SqliteStore`] handles sharing it.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./stockledger.db")).await?;
/// let ledger = Ledger::new(db.store());
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (or creates) the database and applies migrations if enabled.
    ///
    /// ## Connection Settings
    /// - WAL journal
    /// - NORMAL synchronous
    /// - Foreign keys enforced
    /// - `busy_timeout` from the config
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening database"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite leaves FK enforcement off unless asked
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new();
        if config.is_in_memory() {
            // Recycling the only connection would drop the database
            pool_options = pool_options.max_lifetime(None).idle_timeout(None);
        } else {
            pool_options = pool_options.idle_timeout(Some(config.idle_timeout));
        }

        let pool = pool_options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!("Database pool created");

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending embedded migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns `(total, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    /// The underlying pool, for diagnostics.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A record store over this pool.
    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Closes every pooled connection. Store calls fail afterwards.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// Whether the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
