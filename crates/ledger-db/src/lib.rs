//! # ledger-db: Record Store for Stockledger
//!
//! The keyed record store the engine reads and writes through, with a
//! SQLite implementation and an in-memory one.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockledger Data Flow                            │
//! │                                                                         │
//! │  ledger-engine (Catalog / SalesDesk / Reports)                         │
//! │       │  Arc<S: RecordStore>                                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ledger-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  store (trait)│    │  SqliteStore  │    │  Migrations  │  │   │
//! │  │   │  RecordStore  │◄───│  MemoryStore  │    │  (embedded)  │  │   │
//! │  │   │  StoreTx      │    │               │    │ 001_init.sql │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                                │   │
//! │  │                        Database (pool.rs)                       │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │                         SQLite file (WAL)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `RecordStore` / `StoreTransaction` contract and both stores
//! - [`pool`] - SQLite pool creation and configuration
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_db::{Database, DbConfig, RecordStore};
//!
//! let db = Database::new(DbConfig::new("./stockledger.db")).await?;
//! let products = db.store().select_products().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{MemoryStore, RecordStore, SqliteStore, StockChange, StockUpdate, StoreTransaction};
