//! # ledger-core: Pure Business Logic for Stockledger
//!
//! This crate is the **heart** of Stockledger. It contains the sale building,
//! pricing and reporting rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Stockledger Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI collaborator (menus, prompts)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           ledger-engine (Catalog, SalesDesk, Reports)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ledger-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │  money  │ │ builder │ │ pricing │ │ report  │  │   │
//! │  │   │ Product │ │  Money  │ │  Sale   │ │Discount │ │ top-N,  │  │   │
//! │  │   │  Sale   │ │         │ │ Builder │ │ resolve │ │ periods │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ledger-db (RecordStore: SQLite / memory)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleItem, drafts)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Catalog input rules
//! - [`builder`] - In-progress sale accumulation
//! - [`pricing`] - Discount parsing, payment menu, sale drafts
//! - [`report`] - Low stock, periods, best sellers, financial roll-ups
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use ledger_core::builder::SaleBuilder;
//! use ledger_core::pricing::{checkout, SaleStamp};
//! use ledger_core::{Money, Product};
//!
//! let now = Utc::now();
//! let cola = Product {
//!     id: 1,
//!     code: "COKE-330".into(),
//!     name: "Coca-Cola 330ml".into(),
//!     description: None,
//!     unit_price_cents: 2500,
//!     stock_quantity: 10,
//!     min_stock_threshold: 2,
//!     category: None,
//!     active: true,
//!     created_at: now,
//!     updated_at: now,
//! };
//!
//! let mut builder = SaleBuilder::new();
//! builder.add_product(&cola, 4).unwrap();
//! assert_eq!(builder.current_total(), Money::from_cents(10000));
//!
//! let draft = checkout(builder.finish().unwrap(), "10%", "1", None, SaleStamp::at(now)).unwrap();
//! assert_eq!(draft.final_total_cents, 9000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod builder;
pub mod error;
pub mod money;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use builder::SaleBuilder;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use report::DEFAULT_TOP_PRODUCTS_LIMIT;
pub use types::*;
pub use validation::ValidationResult;
