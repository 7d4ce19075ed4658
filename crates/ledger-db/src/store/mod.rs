//! # Record Store Contract
//!
//! The keyed record store every engine service talks to.
//!
//! ## Contract Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RecordStore                                     │
//! │                                                                         │
//! │  Reads (snapshots)          Single-record writes     Multi-record      │
//! │  ─────────────────          ────────────────────     ────────────      │
//! │  select_products()          insert_product()         begin()           │
//! │  select_sales()             update_product()           │               │
//! │  select_sale_items()          (never touches stock)    ▼               │
//! │  find_* (filtered reads)                          StoreTransaction     │
//! │                                                   ─────────────────    │
//! │                                                   insert_sale()        │
//! │                                                   insert_sale_item()   │
//! │                                                   transition_sale()    │
//! │                                                   apply_stock()        │
//! │                                                   commit() / rollback()│
//! │                                                                         │
//! │  Implementations:  SqliteStore (sqlx)    MemoryStore (tokio Mutex)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Every method returns `DbResult`; absence is `Ok(None)`, never a panic
//! - Stock only moves through [`StoreTransaction::apply_stock`]
//! - Nothing is hard-deleted, so there is no delete operation
//! - A transaction dropped without `commit` is rolled back

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DbResult;
use ledger_core::{LineItem, NewProduct, Product, Sale, SaleDraft, SaleItem, SaleStatus};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// =============================================================================
// Stock Changes
// =============================================================================

/// A stock movement applied inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockChange {
    /// Sale decrement. Applied only when the product is active and
    /// `stock_quantity >= qty`.
    Take(i64),
    /// Cancellation restore. Unconditional and uncapped; inactive products
    /// are restored too.
    Restore(i64),
    /// Manual exit. Active products only; floors at zero.
    Withdraw(i64),
    /// Manual entry. Active products only.
    Receive(i64),
    /// Exact count. Active products only.
    Set(i64),
}

/// Outcome of [`StoreTransaction::apply_stock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockUpdate {
    /// The change was applied. `previous` is the level the change was
    /// applied to, read under the same write lock.
    Applied { previous: i64, current: i64 },
    /// A `Take` found too little stock. Nothing changed.
    Insufficient { available: i64 },
    /// The new level would not fit in an `i64`. Nothing changed.
    OutOfRange { current: i64 },
    /// No product with that id, or the change requires an active product
    /// and the product is inactive. Nothing changed.
    Missing,
}

// =============================================================================
// RecordStore
// =============================================================================

/// Typed access to the product, sale and sale-item record sets.
///
/// The `find_*` methods have default implementations that filter the full
/// snapshots; stores with an index override them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every product, active or not, ordered by id.
    async fn select_products(&self) -> DbResult<Vec<Product>>;

    /// Every sale, ordered by id.
    async fn select_sales(&self) -> DbResult<Vec<Sale>>;

    /// Every sale item, ordered by id.
    async fn select_sale_items(&self) -> DbResult<Vec<SaleItem>>;

    /// Inserts a product and returns it with its assigned id and timestamps.
    ///
    /// The caller validates and normalises the record first.
    async fn insert_product(&self, product: &NewProduct) -> DbResult<Product>;

    /// Writes the descriptive fields and `active` flag of an existing
    /// product and returns the stored record.
    ///
    /// `stock_quantity` is NOT written: a concurrent sale's decrement is
    /// never overwritten by a catalog edit. Fails with `NotFound` if the id
    /// does not exist.
    async fn update_product(&self, product: &Product) -> DbResult<Product>;

    /// Opens a transaction for multi-record writes.
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>>;

    /// Product by id, active or not.
    async fn find_product(&self, id: i64) -> DbResult<Option<Product>> {
        Ok(self.select_products().await?.into_iter().find(|p| p.id == id))
    }

    /// Active product by exact (normalised) code.
    async fn find_active_product(&self, code: &str) -> DbResult<Option<Product>> {
        Ok(self
            .select_products()
            .await?
            .into_iter()
            .find(|p| p.active && p.code == code))
    }

    /// Sale by number, any status.
    async fn find_sale(&self, number: &str) -> DbResult<Option<Sale>> {
        Ok(self.select_sales().await?.into_iter().find(|s| s.number == number))
    }

    /// Items of one sale, ordered by id.
    async fn find_sale_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        Ok(self
            .select_sale_items()
            .await?
            .into_iter()
            .filter(|i| i.sale_id == sale_id)
            .collect())
    }
}

// =============================================================================
// StoreTransaction
// =============================================================================

/// A unit of work over several records. Either every write lands or none.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts a sale header with status `Finalized`.
    ///
    /// Fails with `UniqueViolation` if the number is taken.
    async fn insert_sale(&mut self, draft: &SaleDraft) -> DbResult<Sale>;

    /// Inserts one line of `sale_id`.
    ///
    /// Fails with `ForeignKeyViolation` if the sale or product is unknown.
    async fn insert_sale_item(&mut self, sale_id: i64, item: &LineItem) -> DbResult<SaleItem>;

    /// Moves the sale numbered `number` from `from` to `to`.
    ///
    /// Conditional: returns `Ok(None)` when no sale has that number or its
    /// status is not `from`, and the updated sale otherwise.
    async fn transition_sale(
        &mut self,
        number: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<Option<Sale>>;

    /// Items of one sale as seen by this transaction.
    async fn sale_items(&mut self, sale_id: i64) -> DbResult<Vec<SaleItem>>;

    /// Applies a stock movement to one product.
    async fn apply_stock(&mut self, product_id: i64, change: StockChange) -> DbResult<StockUpdate>;

    /// Makes every write of this transaction visible.
    async fn commit(self: Box<Self>) -> DbResult<()>;

    /// Discards every write of this transaction.
    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Next stock level for a change, or why it cannot be applied.
///
/// Both stores read `(stock, active)` under their write lock, then apply
/// this rule.
pub(crate) fn next_stock_level(stock: i64, active: bool, change: StockChange) -> StockUpdate {
    let next = match change {
        StockChange::Restore(qty) => stock.checked_add(qty),
        _ if !active => return StockUpdate::Missing,
        StockChange::Take(qty) if stock < qty => {
            return StockUpdate::Insufficient { available: stock }
        }
        StockChange::Take(qty) => stock.checked_sub(qty),
        StockChange::Withdraw(qty) => Some(stock.saturating_sub(qty).max(0)),
        StockChange::Receive(qty) => stock.checked_add(qty),
        StockChange::Set(qty) => Some(qty),
    };

    match next {
        Some(current) => StockUpdate::Applied {
            previous: stock,
            current,
        },
        None => StockUpdate::OutOfRange { current: stock },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
