//! # In-Memory Store
//!
//! A [`RecordStore`] kept entirely in process memory. Used by tests and by
//! callers that want the engine without a database file.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   committed: RwLock<Arc<Tables>>      writer: Mutex<()>                │
//! │        │                                  │                             │
//! │        ├── select_*: read → clone Arc     │  (never waits on writer)   │
//! │        │                                  │                             │
//! │        │   insert/update_product ─────────┤ lock → copy → publish      │
//! │        │                                  │                             │
//! │        │   begin(): lock_owned() ─────────┴─► MemoryTransaction        │
//! │        │                                      ├── writer guard         │
//! │        │                                      └── working copy         │
//! │        │                                             │                  │
//! │        └──────────── commit: publish working copy ◄──┘                 │
//! │                      rollback / drop: working copy discarded           │
//! │                                                                         │
//! │   Writer acquisition is bounded by `lock_timeout` → DbError::Busy      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writers serialise on the writer mutex, so a conditional stock take can
//! never race another one. Readers see the last published tables.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{next_stock_level, RecordStore, StockChange, StoreTransaction, StockUpdate};
use crate::error::{DbError, DbResult};
use ledger_core::{LineItem, NewProduct, Product, Sale, SaleDraft, SaleItem, SaleStatus};

/// Default bound on writer lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Tables
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Vec<Product>,
    sales: Vec<Sale>,
    items: Vec<SaleItem>,
    next_product_id: i64,
    next_sale_id: i64,
    next_item_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory record store.
///
/// Cloning shares the same tables.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    committed: Arc<RwLock<Arc<Tables>>>,
    writer: Arc<Mutex<()>>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with the default lock timeout.
    pub fn new() -> Self {
        MemoryStore::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates an empty store whose writer waits give up after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        MemoryStore {
            committed: Arc::new(RwLock::new(Arc::new(Tables::default()))),
            writer: Arc::new(Mutex::new(())),
            lock_timeout,
        }
    }

    fn busy(&self) -> DbError {
        DbError::Busy(format!(
            "writer lock not acquired within {} ms",
            self.lock_timeout.as_millis()
        ))
    }

    /// Last published tables.
    async fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&*self.committed.read().await)
    }

    async fn lock_writer(&self) -> DbResult<MutexGuard<'_, ()>> {
        tokio::time::timeout(self.lock_timeout, self.writer.lock())
            .await
            .map_err(|_| self.busy())
    }

    /// Runs `write` on a copy of the tables under the writer lock and
    /// publishes the copy.
    async fn write<T>(&self, write: impl FnOnce(&mut Tables) -> DbResult<T>) -> DbResult<T> {
        let _writer = self.lock_writer().await?;
        let mut work = (*self.snapshot().await).clone();
        let out = write(&mut work)?;
        *self.committed.write().await = Arc::new(work);
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select_products(&self) -> DbResult<Vec<Product>> {
        Ok(self.snapshot().await.products.clone())
    }

    async fn select_sales(&self) -> DbResult<Vec<Sale>> {
        Ok(self.snapshot().await.sales.clone())
    }

    async fn select_sale_items(&self) -> DbResult<Vec<SaleItem>> {
        Ok(self.snapshot().await.items.clone())
    }

    async fn insert_product(&self, product: &NewProduct) -> DbResult<Product> {
        let stored = self
            .write(|tables| {
                let now = Utc::now();
                let stored = Product {
                    id: Tables::next_id(&mut tables.next_product_id),
                    code: product.code.clone(),
                    name: product.name.clone(),
                    description: product.description.clone(),
                    unit_price_cents: product.unit_price_cents,
                    stock_quantity: product.stock_quantity,
                    min_stock_threshold: product.min_stock_threshold,
                    category: product.category.clone(),
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                tables.products.push(stored.clone());
                Ok(stored)
            })
            .await?;

        debug!(id = stored.id, code = %stored.code, "Inserted product");
        Ok(stored)
    }

    async fn update_product(&self, product: &Product) -> DbResult<Product> {
        let stored = self
            .write(|tables| {
                let existing = tables
                    .products
                    .iter_mut()
                    .find(|p| p.id == product.id)
                    .ok_or_else(|| DbError::not_found("Product", product.id))?;

                existing.name = product.name.clone();
                existing.description = product.description.clone();
                existing.unit_price_cents = product.unit_price_cents;
                existing.min_stock_threshold = product.min_stock_threshold;
                existing.category = product.category.clone();
                existing.active = product.active;
                existing.updated_at = product.updated_at;
                Ok(existing.clone())
            })
            .await?;

        debug!(id = product.id, "Updated product");
        Ok(stored)
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let writer = tokio::time::timeout(self.lock_timeout, Arc::clone(&self.writer).lock_owned())
            .await
            .map_err(|_| self.busy())?;
        let work = (*self.snapshot().await).clone();
        Ok(Box::new(MemoryTransaction {
            writer,
            committed: Arc::clone(&self.committed),
            work,
        }))
    }
}

// =============================================================================
// MemoryTransaction
// =============================================================================

/// Holds the writer lock and a working copy of every table.
struct MemoryTransaction {
    writer: OwnedMutexGuard<()>,
    committed: Arc<RwLock<Arc<Tables>>>,
    work: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_sale(&mut self, draft: &SaleDraft) -> DbResult<Sale> {
        if self.work.sales.iter().any(|s| s.number == draft.number) {
            return Err(DbError::UniqueViolation {
                column: "sales.number".into(),
            });
        }

        let sale = Sale {
            id: Tables::next_id(&mut self.work.next_sale_id),
            number: draft.number.clone(),
            timestamp: draft.timestamp,
            subtotal_cents: draft.subtotal_cents,
            discount_cents: draft.discount_cents,
            final_total_cents: draft.final_total_cents,
            payment_method: draft.payment_method,
            status: SaleStatus::Finalized,
            notes: draft.notes.clone(),
        };
        self.work.sales.push(sale.clone());
        Ok(sale)
    }

    async fn insert_sale_item(&mut self, sale_id: i64, item: &LineItem) -> DbResult<SaleItem> {
        if !self.work.sales.iter().any(|s| s.id == sale_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("sale {sale_id} does not exist"),
            });
        }
        if !self.work.products.iter().any(|p| p.id == item.product_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("product {} does not exist", item.product_id),
            });
        }

        let stored = SaleItem {
            id: Tables::next_id(&mut self.work.next_item_id),
            sale_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            subtotal_cents: item.subtotal_cents,
        };
        self.work.items.push(stored.clone());
        Ok(stored)
    }

    async fn transition_sale(
        &mut self,
        number: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<Option<Sale>> {
        let sale = self
            .work
            .sales
            .iter_mut()
            .find(|s| s.number == number && s.status == from);

        Ok(sale.map(|s| {
            s.status = to;
            s.clone()
        }))
    }

    async fn sale_items(&mut self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        Ok(self
            .work
            .items
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn apply_stock(&mut self, product_id: i64, change: StockChange) -> DbResult<StockUpdate> {
        let Some(product) = self.work.products.iter_mut().find(|p| p.id == product_id) else {
            return Ok(StockUpdate::Missing);
        };

        let update = next_stock_level(product.stock_quantity, product.active, change);
        if let StockUpdate::Applied { current, .. } = update {
            product.stock_quantity = current;
            product.updated_at = Utc::now();
        }
        Ok(update)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let MemoryTransaction {
            writer,
            committed,
            work,
        } = *self;
        *committed.write().await = Arc::new(work);
        drop(writer);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
