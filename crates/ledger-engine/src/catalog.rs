//! # Product Catalog
//!
//! Product registration, lookup, edits, soft delete and stock movements.
//!
//! ## Stock Movements
//! ```text
//! receive_stock(code, 5)   stock + 5
//! withdraw_stock(code, 5)  max(stock - 5, 0)
//! set_stock(code, 12)      stock = 12
//! ```
//!
//! Each movement runs in its own store transaction and reports the level
//! it was applied to, the new level and the low-stock flag. Sale decrements never go
//! through here; the [`SalesDesk`](crate::SalesDesk) owns those.
//!
//! Every lookup ignores inactive (removed) products.

use std::sync::Arc;

use chrono::Utc;
use ledger_core::validation::{
    normalize_code, validate_changes, validate_movement_quantity, validate_new_product,
    validate_non_negative, validate_search_query,
};
use ledger_core::{CoreError, NewProduct, Product, ProductChanges, ValidationError};
use ledger_db::{RecordStore, StockChange, StockUpdate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, LedgerResult};

/// Stock level around a movement. Both levels come from the same store
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: i64,
    pub code: String,
    pub previous: i64,
    pub current: i64,
    /// `current <= min_stock_threshold`.
    pub low_stock: bool,
}

/// Catalog operations over a shared store.
pub struct Catalog<S> {
    store: Arc<S>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Catalog {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> Catalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Catalog { store }
    }

    // =========================================================================
    // Registration & Lookup
    // =========================================================================

    /// Registers a product after validating it.
    ///
    /// The code is trimmed and upper-cased before anything else; a code
    /// already carried by an active product is rejected with `Duplicate`.
    pub async fn register(&self, product: NewProduct) -> LedgerResult<Product> {
        let product = NewProduct {
            code: normalize_code(&product.code),
            name: product.name.trim().to_string(),
            ..product
        };
        validate_new_product(&product)?;

        if self.store.find_active_product(&product.code).await?.is_some() {
            warn!(code = %product.code, "Rejected duplicate product code");
            return Err(ValidationError::Duplicate {
                field: "code".into(),
                value: product.code,
            }
            .into());
        }

        let stored = self.store.insert_product(&product).await?;
        info!(id = stored.id, code = %stored.code, "Registered product");
        Ok(stored)
    }

    /// Every active product, in registration order.
    pub async fn list_active(&self) -> LedgerResult<Vec<Product>> {
        let products = self.store.select_products().await?;
        Ok(products.into_iter().filter(|p| p.active).collect())
    }

    /// The active product with exactly this code.
    pub async fn find_by_code(&self, code: &str) -> LedgerResult<Product> {
        let code = normalize_code(code);
        self.store
            .find_active_product(&code)
            .await?
            .ok_or(LedgerError::Core(CoreError::ProductNotFound(code)))
    }

    /// The first active product whose code contains `fragment`.
    pub async fn search_by_code(&self, fragment: &str) -> LedgerResult<Option<Product>> {
        let fragment = normalize_code(&validate_search_query(fragment)?);
        let products = self.list_active().await?;
        Ok(products.into_iter().find(|p| p.code.contains(&fragment)))
    }

    /// Active products whose name contains `fragment`, ignoring case.
    pub async fn search_by_name(&self, fragment: &str) -> LedgerResult<Vec<Product>> {
        let needle = validate_search_query(fragment)?.to_lowercase();
        let matches: Vec<Product> = self
            .list_active()
            .await?
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect();

        debug!(query = %needle, results = matches.len(), "Name search");
        Ok(matches)
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Applies `changes` to the active product `code`.
    ///
    /// Code and stock are not editable here.
    pub async fn edit(&self, code: &str, changes: ProductChanges) -> LedgerResult<Product> {
        validate_changes(&changes)?;
        let mut product = self.find_by_code(code).await?;

        if changes.is_empty() {
            return Ok(product);
        }

        changes.apply_to(&mut product, Utc::now());
        let updated = self.store.update_product(&product).await?;
        info!(id = updated.id, code = %updated.code, "Edited product");
        Ok(updated)
    }

    /// Soft-deletes the product. Its sale history stays intact.
    pub async fn remove(&self, code: &str) -> LedgerResult<Product> {
        let mut product = self.find_by_code(code).await?;
        product.active = false;
        product.updated_at = Utc::now();

        let removed = self.store.update_product(&product).await?;
        info!(id = removed.id, code = %removed.code, "Removed product");
        Ok(removed)
    }

    // =========================================================================
    // Stock Movements
    // =========================================================================

    /// Stock entry. `quantity` must be positive.
    pub async fn receive_stock(&self, code: &str, quantity: i64) -> LedgerResult<StockLevel> {
        validate_movement_quantity(quantity)?;
        self.move_stock(code, StockChange::Receive(quantity)).await
    }

    /// Stock exit. `quantity` must be positive; the level floors at zero.
    pub async fn withdraw_stock(&self, code: &str, quantity: i64) -> LedgerResult<StockLevel> {
        validate_movement_quantity(quantity)?;
        self.move_stock(code, StockChange::Withdraw(quantity)).await
    }

    /// Sets the exact level (inventory count). `quantity` must be >= 0.
    pub async fn set_stock(&self, code: &str, quantity: i64) -> LedgerResult<StockLevel> {
        validate_non_negative("quantity", quantity)?;
        self.move_stock(code, StockChange::Set(quantity)).await
    }

    async fn move_stock(&self, code: &str, change: StockChange) -> LedgerResult<StockLevel> {
        let product = self.find_by_code(code).await?;
        let mut tx = self.store.begin().await?;

        let update = match tx.apply_stock(product.id, change).await {
            Ok(update) => update,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, code = %product.code, "Rollback failed");
                }
                return Err(e.into());
            }
        };

        match update {
            StockUpdate::Applied { previous, current } => {
                tx.commit().await?;
                let level = StockLevel {
                    product_id: product.id,
                    code: product.code,
                    previous,
                    current,
                    low_stock: current <= product.min_stock_threshold,
                };
                info!(
                    code = %level.code,
                    ?change,
                    previous = level.previous,
                    current,
                    low_stock = level.low_stock,
                    "Stock moved"
                );
                Ok(level)
            }
            StockUpdate::OutOfRange { current } => {
                tx.rollback().await?;
                warn!(code = %product.code, ?change, current, "Stock move out of range");
                Err(ValidationError::OutOfRange {
                    field: "quantity".into(),
                    min: 1,
                    max: i64::MAX - current,
                }
                .into())
            }
            // Removed between lookup and update
            StockUpdate::Missing | StockUpdate::Insufficient { .. } => {
                tx.rollback().await?;
                warn!(code = %product.code, ?change, "Stock move on a product no longer active");
                Err(CoreError::ProductNotFound(product.code).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledger_core::{Money, Sale, SaleItem};
    use ledger_db::{DbResult, MemoryStore, StoreTransaction};

    fn catalog() -> Catalog<MemoryStore> {
        Catalog::new(Arc::new(MemoryStore::new()))
    }

    fn soda() -> NewProduct {
        NewProduct::new(" coke-330 ", "Coca-Cola 330ml", Money::from_cents(250)).with_stock(10, 2)
    }

    #[tokio::test]
    async fn test_register_normalizes_code() {
        let catalog = catalog();
        let product = catalog.register(soda()).await.unwrap();
        assert_eq!(product.code, "COKE-330");
        assert!(product.active);

        let found = catalog.find_by_code("coke-330").await.unwrap();
        assert_eq!(found.id, product.id);
    }

    #[tokio::test]
    async fn test_register_rejects_active_duplicate() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();

        let err = catalog.register(soda()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_code_is_reusable_after_removal() {
        let catalog = catalog();
        let first = catalog.register(soda()).await.unwrap();
        catalog.remove("COKE-330").await.unwrap();

        let second = catalog.register(soda()).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(catalog.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let catalog = catalog();
        let err = catalog
            .register(NewProduct::new("", "Nameless", Money::zero()))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());

        let err = catalog
            .register(NewProduct::new("A1", "Apple", Money::from_cents(-1)))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_removed_products_are_hidden() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();
        let removed = catalog.remove("COKE-330").await.unwrap();
        assert!(!removed.active);

        assert!(catalog.list_active().await.unwrap().is_empty());
        assert!(matches!(
            catalog.find_by_code("COKE-330").await,
            Err(LedgerError::Core(CoreError::ProductNotFound(_)))
        ));
        assert!(catalog.search_by_code("COKE").await.unwrap().is_none());
        assert!(catalog.search_by_name("cola").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_searches() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();
        catalog
            .register(NewProduct::new("PEPSI-330", "Pepsi Cola 330ml", Money::from_cents(240)))
            .await
            .unwrap();

        let by_code = catalog.search_by_code("330").await.unwrap().unwrap();
        assert_eq!(by_code.code, "COKE-330");

        let by_name = catalog.search_by_name("COLA").await.unwrap();
        assert_eq!(by_name.len(), 2);

        assert!(catalog.search_by_name("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_edit_keeps_stock_and_code() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();

        let changes = ProductChanges {
            unit_price_cents: Some(300),
            min_stock_threshold: Some(4),
            ..ProductChanges::default()
        };
        let edited = catalog.edit("COKE-330", changes).await.unwrap();

        assert_eq!(edited.unit_price_cents, 300);
        assert_eq!(edited.min_stock_threshold, 4);
        assert_eq!(edited.name, "Coca-Cola 330ml");
        assert_eq!(edited.stock_quantity, 10);
        assert_eq!(edited.code, "COKE-330");
    }

    #[tokio::test]
    async fn test_stock_movements() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();

        let level = catalog.receive_stock("COKE-330", 5).await.unwrap();
        assert_eq!((level.previous, level.current), (10, 15));
        assert!(!level.low_stock);

        let level = catalog.withdraw_stock("COKE-330", 14).await.unwrap();
        assert_eq!(level.current, 1);
        assert!(level.low_stock);

        let level = catalog.withdraw_stock("COKE-330", 50).await.unwrap();
        assert_eq!(level.current, 0);

        let level = catalog.set_stock("COKE-330", 7).await.unwrap();
        assert_eq!(level.current, 7);
        assert_eq!(catalog.find_by_code("COKE-330").await.unwrap().stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_stock_movement_quantities_validated() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();

        assert!(catalog.receive_stock("COKE-330", 0).await.is_err());
        assert!(catalog.withdraw_stock("COKE-330", -3).await.is_err());
        assert!(catalog.set_stock("COKE-330", -1).await.is_err());
        assert!(catalog.set_stock("COKE-330", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_receive_beyond_range_is_rejected() {
        let catalog = catalog();
        catalog.register(soda()).await.unwrap();

        let err = catalog.receive_stock("COKE-330", i64::MAX).await.unwrap_err();
        assert_eq!(
            err.as_core(),
            Some(&CoreError::Validation(ValidationError::OutOfRange {
                field: "quantity".into(),
                min: 1,
                max: i64::MAX - 10,
            }))
        );
        assert_eq!(catalog.find_by_code("COKE-330").await.unwrap().stock_quantity, 10);

        let level = catalog.receive_stock("COKE-330", i64::MAX - 10).await.unwrap();
        assert_eq!(level.current, i64::MAX);
    }

    /// Serves lookups from a copy taken before later writes.
    struct StaleLookups {
        inner: MemoryStore,
        stale: Product,
    }

    #[async_trait]
    impl RecordStore for StaleLookups {
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
            self.inner.begin().await
        }

        async fn find_active_product(&self, _code: &str) -> DbResult<Option<Product>> {
            Ok(Some(self.stale.clone()))
        }
    }

    #[tokio::test]
    async fn test_previous_level_comes_from_the_write() {
        let inner = MemoryStore::new();
        let stale = inner
            .insert_product(&NewProduct::new("COKE-330", "Coca-Cola 330ml", Money::from_cents(250)).with_stock(10, 2))
            .await
            .unwrap();

        // A sale takes 6 units after the catalog looked the product up
        let mut tx = inner.begin().await.unwrap();
        tx.apply_stock(stale.id, StockChange::Take(6)).await.unwrap();
        tx.commit().await.unwrap();

        let catalog = Catalog::new(Arc::new(StaleLookups { inner, stale }));
        let level = catalog.receive_stock("COKE-330", 5).await.unwrap();

        assert_eq!((level.previous, level.current), (4, 9));
    }
}
