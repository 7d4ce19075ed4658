//! Shared fixtures for the engine integration tests.

#![allow(dead_code, unused_macros)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledger_core::{
    LineItem, Money, NewProduct, Product, Sale, SaleBuilder, SaleDraft, SaleItem, SaleStatus,
};
use ledger_db::{
    Database, DbConfig, DbError, DbResult, MemoryStore, RecordStore, SqliteStore, StockChange,
    StockUpdate, StoreTransaction,
};
use ledger_engine::{CommittedSale, Ledger, LedgerResult};

/// Generates one multi-threaded test per store for each scenario function.
macro_rules! on_both_stores {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(super::common::memory_ledger()).await;
                }
            )*
        }

        mod sqlite {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $name() {
                    super::$name(super::common::sqlite_ledger().await).await;
                }
            )*
        }
    };
}

// =============================================================================
// Ledgers
// =============================================================================

pub fn memory_ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new())
}

pub async fn sqlite_ledger() -> Ledger<SqliteStore> {
    let db = Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database");
    Ledger::new(db.store())
}

// =============================================================================
// Helpers
// =============================================================================

pub async fn stock_product<S: RecordStore>(
    ledger: &Ledger<S>,
    code: &str,
    price_cents: i64,
    stock: i64,
    min_stock: i64,
) -> Product {
    ledger
        .catalog()
        .register(
            NewProduct::new(code, format!("Product {code}"), Money::from_cents(price_cents))
                .with_stock(stock, min_stock),
        )
        .await
        .expect("register product")
}

/// Current stock of a product, active or not.
pub async fn stock_of<S: RecordStore>(ledger: &Ledger<S>, product_id: i64) -> i64 {
    ledger
        .store()
        .find_product(product_id)
        .await
        .expect("store read")
        .expect("product exists")
        .stock_quantity
}

pub async fn build<S: RecordStore>(ledger: &Ledger<S>, lines: &[(&str, i64)]) -> SaleBuilder {
    let desk = ledger.sales();
    let mut builder = SaleBuilder::new();
    for (code, qty) in lines {
        desk.add_item(&mut builder, code, *qty)
            .await
            .expect("add item");
    }
    builder
}

pub async fn sell<S: RecordStore>(
    ledger: &Ledger<S>,
    lines: &[(&str, i64)],
    discount: &str,
    payment: &str,
) -> LedgerResult<CommittedSale> {
    let builder = build(ledger, lines).await;
    ledger.sales().complete(builder, discount, payment, None).await
}

/// Everything the store holds, for before/after comparisons.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
    pub items: Vec<SaleItem>,
}

pub async fn snapshot<S: RecordStore>(store: &S) -> Snapshot {
    Snapshot {
        products: store.select_products().await.expect("products"),
        sales: store.select_sales().await.expect("sales"),
        items: store.select_sale_items().await.expect("items"),
    }
}

// =============================================================================
// Fault Injection
// =============================================================================

/// Where the next transaction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    InsertSale,
    /// The n-th (0-based) item insert of the transaction.
    InsertItem(usize),
    /// The n-th (0-based) stock change of the transaction.
    ApplyStock(usize),
    Transition,
    SaleItems,
    Commit,
}

/// A memory store whose transactions fail on demand.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fault: Mutex<Option<Fault>>,
    fail_rollback: Mutex<bool>,
}

impl FaultyStore {
    pub fn fail_at(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn fail_rollback(&self, fail: bool) {
        *self.fail_rollback.lock().unwrap() = fail;
    }

    pub fn heal(&self) {
        *self.fault.lock().unwrap() = None;
        *self.fail_rollback.lock().unwrap() = false;
    }
}

fn injected(what: &str) -> DbError {
    DbError::QueryFailed(format!("injected failure: {what}"))
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn select_products(&self) -> DbResult<Vec<Product>> {
        self.inner.select_products().await
    }

    async fn select_sales(&self) -> DbResult<Vec<Sale>> {
        self.inner.select_sales().await
    }

    async fn select_sale_items(&self) -> DbResult<Vec<SaleItem>> {
        self.inner.select_sale_items().await
    }

    async fn insert_product(&self, product: &NewProduct) -> DbResult<Product> {
        self.inner.insert_product(product).await
    }

    async fn update_product(&self, product: &Product) -> DbResult<Product> {
        self.inner.update_product(product).await
    }

    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let inner = self.inner.begin().await?;
        let fault = *self.fault.lock().unwrap();
        let fail_rollback = *self.fail_rollback.lock().unwrap();
        Ok(Box::new(FaultyTransaction {
            inner,
            fault,
            fail_rollback,
            item_calls: 0,
            stock_calls: 0,
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fault: Option<Fault>,
    fail_rollback: bool,
    item_calls: usize,
    stock_calls: usize,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn insert_sale(&mut self, draft: &SaleDraft) -> DbResult<Sale> {
        if self.fault == Some(Fault::InsertSale) {
            return Err(injected("insert_sale"));
        }
        self.inner.insert_sale(draft).await
    }

    async fn insert_sale_item(&mut self, sale_id: i64, item: &LineItem) -> DbResult<SaleItem> {
        let call = self.item_calls;
        self.item_calls += 1;
        if self.fault == Some(Fault::InsertItem(call)) {
            return Err(injected("insert_sale_item"));
        }
        self.inner.insert_sale_item(sale_id, item).await
    }

    async fn transition_sale(
        &mut self,
        number: &str,
        from: SaleStatus,
        to: SaleStatus,
    ) -> DbResult<Option<Sale>> {
        if self.fault == Some(Fault::Transition) {
            return Err(injected("transition_sale"));
        }
        self.inner.transition_sale(number, from, to).await
    }

    async fn sale_items(&mut self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        if self.fault == Some(Fault::SaleItems) {
            return Err(injected("sale_items"));
        }
        self.inner.sale_items(sale_id).await
    }

    async fn apply_stock(&mut self, product_id: i64, change: StockChange) -> DbResult<StockUpdate> {
        let call = self.stock_calls;
        self.stock_calls += 1;
        if self.fault == Some(Fault::ApplyStock(call)) {
            return Err(injected("apply_stock"));
        }
        self.inner.apply_stock(product_id, change).await
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        if self.fault == Some(Fault::Commit) {
            // Dropping the inner transaction discards its work
            return Err(DbError::TransactionFailed("injected failure: commit".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        if self.fail_rollback {
            return Err(DbError::TransactionFailed("injected failure: rollback".into()));
        }
        self.inner.rollback().await
    }
}

pub fn faulty_ledger() -> (Ledger<FaultyStore>, Arc<FaultyStore>) {
    let store = Arc::new(FaultyStore::default());
    (Ledger::from_shared(Arc::clone(&store)), store)
}
