//! # Report Aggregation
//!
//! Pure read-side computations over snapshots of products, sales and sale
//! items. The engine reads the snapshots from the store and passes the
//! current date and time zone in; nothing here touches the clock.
//!
//! ## Reports
//! ```text
//! ┌───────────────────┬──────────────────────────────────────────────────┐
//! │ low_stock         │ active && stock_quantity <= min_stock_threshold  │
//! │ sales_in_period   │ finalized sales, local date in [start, end]      │
//! │ PeriodSummary     │ count, revenue = Σ final_total, average ticket   │
//! │ top_products      │ items of finalized sales grouped by product      │
//! │ payment_breakdown │ count / revenue per payment method               │
//! │ financial_summary │ today + current month + breakdown + low stock    │
//! └───────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Cancelled sales never contribute to any figure.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{PaymentMethod, Product, Sale, SaleItem};

/// Default number of entries in the best-seller list.
pub const DEFAULT_TOP_PRODUCTS_LIMIT: usize = 10;

/// Calendar date of `instant` in `tz`.
pub fn local_date<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

// =============================================================================
// Low Stock
// =============================================================================

/// Active products at or below their minimum stock, in input order.
pub fn low_stock(products: &[Product]) -> Vec<Product> {
    products
        .iter()
        .filter(|p| p.active && p.is_low_stock())
        .cloned()
        .collect()
}

// =============================================================================
// Period Sales
// =============================================================================

/// Count, revenue and average ticket of a set of sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub sale_count: usize,
    /// Σ final_total.
    pub revenue: Money,
    /// revenue / sale_count, zero for an empty period.
    pub average_ticket: Money,
}

impl PeriodSummary {
    /// Summarises `sales` as given. Callers filter out cancelled sales.
    pub fn of<'a>(sales: impl IntoIterator<Item = &'a Sale>) -> Self {
        let (count, revenue) = sales
            .into_iter()
            .fold((0usize, Money::zero()), |(n, total), sale| {
                (n + 1, total + sale.final_total())
            });
        PeriodSummary {
            sale_count: count,
            revenue,
            average_ticket: Money::average(revenue, count),
        }
    }
}

/// Finalized sales whose local date lies in `[start, end]`, newest first.
///
/// Both bounds are inclusive calendar dates: `end` covers the whole day up
/// to 23:59:59.999. An inverted range yields nothing.
pub fn sales_in_period<Tz: TimeZone>(
    sales: &[Sale],
    start: NaiveDate,
    end: NaiveDate,
    tz: &Tz,
) -> Vec<Sale> {
    let mut selected: Vec<Sale> = sales
        .iter()
        .filter(|s| !s.is_cancelled())
        .filter(|s| {
            let day = local_date(&s.timestamp, tz);
            day >= start && day <= end
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    selected
}

// =============================================================================
// Top Products
// =============================================================================

/// One row of the best-seller list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub product_id: i64,
    /// `None` when the product record no longer exists.
    pub code: Option<String>,
    pub name: Option<String>,
    pub quantity_sold: i64,
    /// Σ item subtotal.
    pub revenue: Money,
    /// revenue / quantity_sold.
    pub average_price: Money,
}

/// Best sellers over the items of finalized sales.
///
/// ## Ordering
/// Summed quantity descending, then product code ascending (rows without a
/// product record last), then product id.
pub fn top_products(
    sales: &[Sale],
    items: &[SaleItem],
    products: &[Product],
    limit: usize,
) -> Vec<TopProduct> {
    let finalized: HashSet<i64> = sales
        .iter()
        .filter(|s| !s.is_cancelled())
        .map(|s| s.id)
        .collect();

    let mut totals: HashMap<i64, (i64, Money)> = HashMap::new();
    for item in items.iter().filter(|i| finalized.contains(&i.sale_id)) {
        let entry = totals.entry(item.product_id).or_insert((0, Money::zero()));
        entry.0 += item.quantity;
        entry.1 += item.subtotal();
    }

    let by_id: HashMap<i64, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut rows: Vec<TopProduct> = totals
        .into_iter()
        .map(|(product_id, (quantity_sold, revenue))| {
            let product = by_id.get(&product_id);
            TopProduct {
                product_id,
                code: product.map(|p| p.code.clone()),
                name: product.map(|p| p.name.clone()),
                quantity_sold,
                revenue,
                average_price: Money::average(revenue, quantity_sold.max(0) as usize),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then_with(|| a.code.is_none().cmp(&b.code.is_none()))
            .then_with(|| a.code.cmp(&b.code))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    rows.truncate(limit);
    rows
}

// =============================================================================
// Payment Breakdown
// =============================================================================

/// Sales and revenue for one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentShare {
    pub method: PaymentMethod,
    pub sale_count: usize,
    pub revenue: Money,
}

/// Groups finalized sales by payment method.
///
/// Sorted by revenue descending, ties in method declaration order. Methods
/// with no sales are omitted.
pub fn payment_breakdown<'a>(sales: impl IntoIterator<Item = &'a Sale>) -> Vec<PaymentShare> {
    let mut shares: HashMap<PaymentMethod, PaymentShare> = HashMap::new();
    for sale in sales.into_iter().filter(|s| !s.is_cancelled()) {
        let share = shares.entry(sale.payment_method).or_insert(PaymentShare {
            method: sale.payment_method,
            sale_count: 0,
            revenue: Money::zero(),
        });
        share.sale_count += 1;
        share.revenue += sale.final_total();
    }

    let mut shares: Vec<PaymentShare> = shares.into_values().collect();
    shares.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.method.cmp(&b.method)));
    shares
}

// =============================================================================
// Financial Summary
// =============================================================================

/// Day and month roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub date: NaiveDate,
    pub today: PeriodSummary,
    /// Calendar month containing `date`.
    pub month: PeriodSummary,
    /// Over the current month only.
    pub payment_breakdown: Vec<PaymentShare>,
    pub low_stock_count: usize,
}

/// Builds the financial summary for `today` in `tz`.
pub fn financial_summary<Tz: TimeZone>(
    sales: &[Sale],
    products: &[Product],
    today: NaiveDate,
    tz: &Tz,
) -> FinancialSummary {
    let finalized: Vec<&Sale> = sales.iter().filter(|s| !s.is_cancelled()).collect();

    let of_today: Vec<&Sale> = finalized
        .iter()
        .copied()
        .filter(|s| local_date(&s.timestamp, tz) == today)
        .collect();

    let of_month: Vec<&Sale> = finalized
        .iter()
        .copied()
        .filter(|s| {
            let day = local_date(&s.timestamp, tz);
            day.year() == today.year() && day.month() == today.month()
        })
        .collect();

    FinancialSummary {
        date: today,
        today: PeriodSummary::of(of_today.iter().copied()),
        month: PeriodSummary::of(of_month.iter().copied()),
        payment_breakdown: payment_breakdown(of_month.iter().copied()),
        low_stock_count: products
            .iter()
            .filter(|p| p.active && p.is_low_stock())
            .count(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
