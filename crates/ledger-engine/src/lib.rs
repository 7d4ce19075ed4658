//! # ledger-engine: Sale Engine for Stockledger
//!
//! Services the UI collaborator calls, wired to a record store by
//! dependency injection.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UI collaborator (menus, prompts, rendering)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  ledger-engine (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   Ledger<S> ──► Catalog<S>    products, stock movements         │   │
//! │  │            ├──► SalesDesk<S>  build, commit, cancel, lookup     │   │
//! │  │            └──► Reports<S>    low stock, period, top, summary   │   │
//! │  └────────────────────────────────┬────────────────────────────────┘   │
//! │                                   │ Arc<S: RecordStore>                 │
//! │                                   ▼                                     │
//! │          ledger-db (SqliteStore / MemoryStore) + ledger-core rules      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_engine::{Ledger, LedgerConfig};
//! use ledger_core::SaleBuilder;
//!
//! let config = LedgerConfig::from_env();
//! let ledger = Ledger::open(&config).await?;
//!
//! let desk = ledger.sales();
//! let mut builder = SaleBuilder::new();
//! desk.add_item(&mut builder, "COKE-330", 2).await?;
//! let committed = desk.complete(builder, "10%", "1", None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod error;
pub mod reports;
pub mod sales;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{Catalog, StockLevel};
pub use config::LedgerConfig;
pub use error::{CommitStage, LedgerError, LedgerResult};
pub use reports::{PeriodReport, Reports};
pub use sales::{Cancellation, CommittedSale, DaySales, SaleDetail, SaleLine, SalesDesk};
pub use telemetry::init_tracing;

use std::sync::Arc;

use ledger_db::{Database, DbError, RecordStore, SqliteStore};
use tracing::info;

use crate::sales::SaleClock;

// =============================================================================
// Ledger
// =============================================================================

/// Owns the store and hands out service handles.
///
/// Handles are cheap clones sharing the same store and sale clock.
pub struct Ledger<S> {
    store: Arc<S>,
    clock: SaleClock,
    top_products_limit: usize,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Ledger {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            top_products_limit: self.top_products_limit,
        }
    }
}

impl<S: RecordStore> Ledger<S> {
    /// Wraps `store` with default settings.
    pub fn new(store: S) -> Self {
        Ledger::from_shared(Arc::new(store))
    }

    /// Wraps a store that is also used elsewhere.
    pub fn from_shared(store: Arc<S>) -> Self {
        Ledger {
            store,
            clock: SaleClock::default(),
            top_products_limit: ledger_core::DEFAULT_TOP_PRODUCTS_LIMIT,
        }
    }

    /// Sets the row count of the best-seller report.
    pub fn with_top_products_limit(mut self, limit: usize) -> Self {
        self.top_products_limit = limit;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> Catalog<S> {
        Catalog::new(Arc::clone(&self.store))
    }

    pub fn sales(&self) -> SalesDesk<S> {
        SalesDesk::with_clock(Arc::clone(&self.store), self.clock.clone())
    }

    pub fn reports(&self) -> Reports<S> {
        Reports::new(Arc::clone(&self.store), self.top_products_limit)
    }
}

impl Ledger<SqliteStore> {
    /// Opens the SQLite database named by `config` and migrates it.
    ///
    /// The parent directory is created when missing.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        let db_config = config.db_config();
        if let Some(parent) = config.database_path.parent() {
            if !db_config.is_in_memory() && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let db = Database::new(db_config).await?;
        info!(path = %config.database_path.display(), "Ledger opened");

        Ok(Ledger::new(db.store()).with_top_products_limit(config.top_products_limit))
    }
}
