//! # Engine Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`LEDGER_*`)
//! 2. Defaults (this file)
//!
//! A variable that is set but does not parse keeps the default and logs a
//! warning.
//!
//! | Variable                      | Default                                  |
//! |-------------------------------|------------------------------------------|
//! | `LEDGER_DB_PATH`              | `<data dir>/stockledger.db`              |
//! | `LEDGER_MAX_CONNECTIONS`      | `5`                                      |
//! | `LEDGER_CONNECT_TIMEOUT_SECS` | `30`                                     |
//! | `LEDGER_TOP_PRODUCTS_LIMIT`   | `10`                                     |
//! | `LEDGER_LOG`                  | `info,ledger=debug,sqlx=warn`            |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ledger_core::DEFAULT_TOP_PRODUCTS_LIMIT;
use ledger_db::DbConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fallback tracing filter when neither `RUST_LOG` nor `LEDGER_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,ledger=debug,sqlx=warn";

const DB_FILE_NAME: &str = "stockledger.db";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Upper bound on pooled connections.
    pub max_connections: u32,

    /// How long a store call waits for a connection.
    pub connect_timeout: Duration,

    /// Rows in the best-seller report.
    pub top_products_limit: usize,

    /// `tracing-subscriber` filter directive.
    pub log_filter: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            database_path: default_database_path(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
            top_products_limit: DEFAULT_TOP_PRODUCTS_LIMIT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden by `LEDGER_*` environment variables.
    pub fn from_env() -> Self {
        LedgerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LedgerConfig::default();

        if let Some(path) = lookup("LEDGER_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path.trim());
        }

        if let Some(max) = parsed::<u32, _>(&lookup, "LEDGER_MAX_CONNECTIONS") {
            if max > 0 {
                config.max_connections = max;
            } else {
                warn!("LEDGER_MAX_CONNECTIONS must be at least 1, keeping default");
            }
        }

        if let Some(secs) = parsed::<u64, _>(&lookup, "LEDGER_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(limit) = parsed::<usize, _>(&lookup, "LEDGER_TOP_PRODUCTS_LIMIT") {
            config.top_products_limit = limit;
        }

        if let Some(filter) = lookup("LEDGER_LOG").filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        config
    }

    /// Store settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .connect_timeout(self.connect_timeout)
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring malformed setting");
            None
        }
    }
}

/// `<platform data dir>/stockledger.db`, or `./stockledger.db` when the
/// platform has no home directory.
pub fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "stockledger", "stockledger")
        .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(DB_FILE_NAME))
}
