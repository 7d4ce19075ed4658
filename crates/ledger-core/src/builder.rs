//! # Sale Builder
//!
//! Accumulates line items for an in-progress sale.
//!
//! ## Builder Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Sale Builder Operations                              │
//! │                                                                         │
//! │  Cashier Action           Builder Call            State Change          │
//! │  ──────────────           ────────────            ────────────          │
//! │                                                                         │
//! │  Scan code + qty ────────► add_product() ───────► items.push(line)     │
//! │                                                                         │
//! │  Undo ───────────────────► remove_last() ───────► items.pop()          │
//! │                                                                         │
//! │  Show total ─────────────► current_total() ─────► (read only)          │
//! │                                                                         │
//! │  Done ───────────────────► finish() ────────────► Vec<LineItem>        │
//! │                                                                         │
//! │  NOTE: stock is CHECKED here, never reserved or mutated. The commit     │
//! │        re-checks atomically in the store.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Every line has `quantity > 0` and a price snapshot
//! - Lines are never merged: one `add_product` is one line, so
//!   `remove_last` undoes exactly the last add
//! - For each product, the summed quantity across lines never exceeds the
//!   stock observed when the line was added

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{LineItem, Product};

/// An in-progress sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleBuilder {
    items: Vec<LineItem>,
}

impl SaleBuilder {
    pub fn new() -> Self {
        SaleBuilder { items: Vec::new() }
    }

    /// Adds `quantity` units of `product` as a new line.
    ///
    /// ## Checks (in order)
    /// 1. Product is active, else `ProductNotFound`
    /// 2. `quantity > 0`, else `InvalidQuantity`
    /// 3. Quantity already in this builder for the same product plus
    ///    `quantity` fits in stock, else `InsufficientStock`
    /// 4. The line subtotal and the running total fit in cents, else
    ///    `Validation(OutOfRange)` on `quantity`
    ///
    /// The caller looks the product up by code; an inactive or missing
    /// product both surface as `ProductNotFound`.
    pub fn add_product(&mut self, product: &Product, quantity: i64) -> CoreResult<&LineItem> {
        if !product.active {
            return Err(CoreError::ProductNotFound(product.code.clone()));
        }

        if quantity <= 0 {
            return Err(CoreError::InvalidQuantity(quantity));
        }

        let already = self.quantity_of(product.id);
        let available = (product.stock_quantity - already).max(0);
        if quantity > available {
            return Err(CoreError::InsufficientStock {
                code: product.code.clone(),
                available,
                requested: quantity,
            });
        }

        let total = self.current_total();
        let line = LineItem::from_product(product, quantity)
            .filter(|line| total.checked_add(line.subtotal()).is_some())
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "quantity".into(),
                min: 1,
                max: max_affordable(total, product.unit_price_cents),
            })?;

        self.items.push(line);
        Ok(&self.items[self.items.len() - 1])
    }

    /// Removes and returns the most recently added line.
    pub fn remove_last(&mut self) -> Option<LineItem> {
        self.items.pop()
    }

    /// Running subtotal of all lines.
    pub fn current_total(&self) -> Money {
        self.items.iter().map(LineItem::subtotal).sum()
    }

    /// Units of `product_id` already in the builder.
    pub fn quantity_of(&self, product_id: i64) -> i64 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Discards every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Ends the builder and hands the lines to pricing.
    ///
    /// Fails with `EmptySale` when nothing was added; nothing is persisted
    /// in that case.
    pub fn finish(self) -> CoreResult<Vec<LineItem>> {
        if self.items.is_empty() {
            return Err(CoreError::EmptySale);
        }
        Ok(self.items)
    }
}

/// Largest quantity at `unit_price_cents` that keeps `total` in range.
fn max_affordable(total: Money, unit_price_cents: i64) -> i64 {
    let headroom = i64::MAX - total.cents().max(0);
    if unit_price_cents <= 0 {
        i64::MAX
    } else {
        headroom / unit_price_cents
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: i64, code: &str, price: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id,
            code: code.into(),
            name: format!("Product {code}"),
            description: None,
            unit_price_cents: price,
            stock_quantity: stock,
            min_stock_threshold: 0,
            category: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_add_accumulates_total() {
        let apple = product(1, "A1", 250, 10);
        let pear = product(2, "P1", 100, 10);
        let mut builder = SaleBuilder::new();

        builder.add_product(&apple, 2).unwrap();
        builder.add_product(&pear, 3).unwrap();

        assert_eq!(builder.len(), 2);
        assert_eq!(builder.current_total(), Money::from_cents(800));
    }

    #[test]
    fn test_inactive_product_is_not_found() {
        let mut apple = product(1, "A1", 250, 10);
        apple.active = false;
        let mut builder = SaleBuilder::new();

        assert_eq!(
            builder.add_product(&apple, 1),
            Err(CoreError::ProductNotFound("A1".into()))
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let apple = product(1, "A1", 250, 10);
        let mut builder = SaleBuilder::new();

        assert_eq!(builder.add_product(&apple, 0), Err(CoreError::InvalidQuantity(0)));
        assert_eq!(builder.add_product(&apple, -2), Err(CoreError::InvalidQuantity(-2)));
    }

    #[test]
    fn test_quantity_above_stock_rejected() {
        let apple = product(1, "A1", 250, 3);
        let mut builder = SaleBuilder::new();

        assert_eq!(
            builder.add_product(&apple, 5),
            Err(CoreError::InsufficientStock {
                code: "A1".into(),
                available: 3,
                requested: 5
            })
        );
        // the product itself is untouched
        assert_eq!(apple.stock_quantity, 3);
    }

    #[test]
    fn test_repeated_adds_count_against_stock() {
        let apple = product(1, "A1", 250, 10);
        let mut builder = SaleBuilder::new();

        builder.add_product(&apple, 6).unwrap();
        let err = builder.add_product(&apple, 6).unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientStock {
                code: "A1".into(),
                available: 4,
                requested: 6
            }
        );
        builder.add_product(&apple, 4).unwrap();
        assert_eq!(builder.quantity_of(1), 10);
    }

    #[test]
    fn test_unrepresentable_subtotal_rejected() {
        let bulk = product(1, "BULK", 1_000_000, i64::MAX);
        let mut builder = SaleBuilder::new();

        assert_eq!(
            builder.add_product(&bulk, 10_000_000_000_000),
            Err(CoreError::Validation(ValidationError::OutOfRange {
                field: "quantity".into(),
                min: 1,
                max: i64::MAX / 1_000_000,
            }))
        );
        assert!(builder.is_empty());

        // Each line fits, but the running total would not
        let max = i64::MAX / 1_000_000;
        builder.add_product(&bulk, max).unwrap();
        let err = builder.add_product(&bulk, max).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_lines_are_not_merged_and_remove_last_undoes_one_add() {
        let apple = product(1, "A1", 250, 10);
        let mut builder = SaleBuilder::new();

        builder.add_product(&apple, 1).unwrap();
        builder.add_product(&apple, 2).unwrap();
        assert_eq!(builder.len(), 2);

        let removed = builder.remove_last().unwrap();
        assert_eq!(removed.quantity, 2);
        assert_eq!(builder.current_total(), Money::from_cents(250));
    }

    #[test]
    fn test_finish_empty_is_empty_sale() {
        assert_eq!(SaleBuilder::new().finish(), Err(CoreError::EmptySale));

        let apple = product(1, "A1", 250, 10);
        let mut builder = SaleBuilder::new();
        builder.add_product(&apple, 1).unwrap();
        builder.remove_last();
        assert_eq!(builder.finish(), Err(CoreError::EmptySale));
    }

    #[test]
    fn test_price_snapshot_survives_catalog_change() {
        let mut apple = product(1, "A1", 250, 10);
        let mut builder = SaleBuilder::new();
        builder.add_product(&apple, 2).unwrap();

        apple.unit_price_cents = 999;

        let items = builder.finish().unwrap();
        assert_eq!(items[0].unit_price_cents, 250);
        assert_eq!(items[0].subtotal_cents, 500);
    }
}
