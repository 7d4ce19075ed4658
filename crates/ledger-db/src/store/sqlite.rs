//! # SQLite Store
//!
//! [`RecordStore`] over the sqlx SQLite pool.
//!
//! ## Conditional Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_stock(id, change)                                               │
//! │                                                                         │
//! │  1. UPDATE products SET stock_quantity = stock_quantity                │
//! │      WHERE id = ? RETURNING stock_quantity, active                     │
//! │       │   (takes the write lock; no row → Missing)                     │
//! │       ▼                                                                 │
//! │  2. next_stock_level(stock, active, change)                            │
//! │       ├── Insufficient / Missing / OutOfRange → nothing written        │
//! │       ▼                                                                 │
//! │  3. UPDATE products SET stock_quantity = current                       │
//! │      WHERE id = ? AND stock_quantity = previous                        │
//! │                                                                         │
//! │  SQLite admits one writer at a time, and the transaction holds the     │
//! │  write lock from step 1 until commit: two concurrent takes can never   │
//! │  both pass against the same units.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are runtime-checked (`sqlx::query_as`), so building the crate
//! does not need a live `DATABASE_URL`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use super::{next_stock_level, RecordStore, StockChange, StockUpdate, StoreTransaction};
use crate::error::{DbError, DbResult};
use ledger_core::{LineItem, NewProduct, Product, Sale, SaleDraft, SaleItem, SaleStatus};

// =============================================================================
// SqliteStore
// =============================================================================

/// Record store backed by a SQLite pool.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./stockledger.db")).await?;
/// let store = db.store();
/// let products = store.select_products().await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn select_products(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Selected products");
        Ok(products)
    }

    async fn select_sales(&self) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        debug!(count = sales.len(), "Selected sales");
        Ok(sales)
    }

    async fn select_sale_items(&self) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        debug!(count = items.len(), "Selected sale items");
        Ok(items)
    }

    async fn insert_product(&self, product: &NewProduct) -> DbResult<Product> {
        debug!(code = %product.code, "Inserting product");

        let now = Utc::now();
        let stored = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                code, name, description, unit_price_cents,
                stock_quantity, min_stock_threshold, category,
                active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.stock_quantity)
        .bind(product.min_stock_threshold)
        .bind(&product.category)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn update_product(&self, product: &Product) -> DbResult<Product> {
        debug!(id = product.id, code = %product.code, "Updating product");

        // stock_quantity is deliberately absent from the SET list
        let stored = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                name = ?2,
                description = ?3,
                unit_price_cents = ?4,
                min_stock_threshold = ?5,
                category = ?6,
                active = ?7,
                updated_at = ?8
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.min_stock_threshold)
        .bind(&product.category)
        .bind(product.active)
        .bind(product.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        stored.ok_or_else(|| DbError::not_found("Product", product.id))
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!("Transaction started");
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn find_product(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    async fn find_active_product(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE code = ?1 AND active = 1 ORDER BY id LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_sale(&self, number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE number = ?1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    async fn find_sale_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items =
            sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY id")
                .bind(sale_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }
}

// =============================================================================
// SqliteTransaction
// =============================================================================

/// An open sqlx transaction. Dropping it without `commit` rolls back.
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_sale(&mut self, draft: &SaleDraft) -> DbResult<Sale> {
        debug!(number = %draft.number, "Inserting sale");

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (
                number, timestamp, subtotal_cents, discount_cents,
                final_total_cents, payment_method, status, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(&draft.number)
        .bind(draft.timestamp)
        .bind(draft.subtotal_cents)
        .bind(draft.discount_cents)
        .bind(draft.final_total_cents)
        .bind(draft.payment_method)
        .bind(SaleStatus::Finalized)
        .bind(&draft.notes)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(sale)
    }

    async fn insert_sale_item(&mut self, sale_id: i64, item: &LineItem) -> DbResult<SaleItem> {
        debug!(sale_id, product_id = item.product_id, quantity = item.quantity, "Inserting sale item");

        let stored = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (
                sale_id, product_id, quantity, unit_price_cents, subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.subtotal_cents)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(stored)
    }

    async fn transition_sale(
        &mut self,
        number: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<Option<Sale>> {
        debug!(number = %number, ?from, ?to, "Transitioning sale");

        let sale = sqlx::query_as::<_, Sale>(
            "UPDATE sales SET status = ?3 WHERE number = ?1 AND status = ?2 RETURNING *",
        )
        .bind(number)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(sale)
    }

    async fn sale_items(&mut self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items =
            sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY id")
                .bind(sale_id)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(items)
    }

    async fn apply_stock(&mut self, product_id: i64, change: StockChange) -> DbResult<StockUpdate> {
        debug!(product_id, ?change, "Applying stock change");

        // A no-op write takes the database write lock before the level is read
        let row: Option<(i64, bool)> = sqlx::query_as(
            "UPDATE products SET stock_quantity = stock_quantity WHERE id = ?1 \
             RETURNING stock_quantity, active",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some((stock, active)) = row else {
            return Ok(StockUpdate::Missing);
        };

        let update = next_stock_level(stock, active, change);
        if let StockUpdate::Applied { previous, current } = update {
            let written = sqlx::query(
                "UPDATE products SET stock_quantity = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND stock_quantity = ?4",
            )
            .bind(current)
            .bind(Utc::now())
            .bind(product_id)
            .bind(previous)
            .execute(&mut *self.tx)
            .await?;

            if written.rows_affected() != 1 {
                return Err(DbError::TransactionFailed(format!(
                    "stock of product {product_id} moved under the write lock"
                )));
            }
        }

        Ok(update)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
