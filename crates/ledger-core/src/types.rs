//! # Domain Types
//!
//! Core domain types used throughout Stockledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (store)     │◄─┐│  id (store)     │◄──│  sale_id (FK)   │       │
//! │  │  code (business)│  ││  number (bus.)  │   │  product_id ────┼──┐    │
//! │  │  stock_quantity │  ││  status         │   │  unit_price     │  │    │
//! │  │  active         │  ││  final_total    │   │  (frozen)       │  │    │
//! │  └─────────────────┘  │└─────────────────┘   └─────────────────┘  │    │
//! │                       └────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  Drafts (not yet persisted):                                           │
//! │    NewProduct ──► Product    SaleDraft ──► Sale    LineItem ──► SaleItem│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every persisted entity has:
//! - `id`: assigned by the store, used for relations
//! - Business key: `code` for products, `number` for sales

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product held in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Store-assigned identity.
    pub id: i64,

    /// User-assigned business key, unique among active products.
    pub code: String,

    /// Display name.
    pub name: String,

    pub description: Option<String>,

    /// Current price in cents. Sales snapshot this value.
    pub unit_price_cents: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    /// At or below this level the product is reported as low stock.
    pub min_stock_threshold: i64,

    pub category: Option<String>,

    /// `false` = soft-deleted. Inactive products never appear in listings,
    /// searches or sales.
    pub active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Stock at or below the configured minimum.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_threshold
    }

    /// Checks whether `quantity` units can be sold right now.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.active && quantity > 0 && self.stock_quantity >= quantity
    }
}

/// Catalog registration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub stock_quantity: i64,
    pub min_stock_threshold: i64,
    pub category: Option<String>,
}

impl NewProduct {
    /// Creates a registration with no description/category and zero stock.
    pub fn new(code: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        NewProduct {
            code: code.into(),
            name: name.into(),
            description: None,
            unit_price_cents: unit_price.cents(),
            stock_quantity: 0,
            min_stock_threshold: 0,
            category: None,
        }
    }

    /// Sets opening stock and the low-stock threshold.
    pub fn with_stock(mut self, stock_quantity: i64, min_stock_threshold: i64) -> Self {
        self.stock_quantity = stock_quantity;
        self.min_stock_threshold = min_stock_threshold;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial edit of a product. `None` keeps the current value.
///
/// Code and stock are deliberately absent: the code is an immutable business
/// key and stock only moves through the stock primitives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub min_stock_threshold: Option<i64>,
    pub category: Option<String>,
}

impl ProductChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.unit_price_cents.is_none()
            && self.min_stock_threshold.is_none()
            && self.category.is_none()
    }

    /// Applies the present fields to `product` and stamps `updated_at`.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.unit_price_cents {
            product.unit_price_cents = price;
        }
        if let Some(min) = self.min_stock_threshold {
            product.min_stock_threshold = min;
        }
        if let Some(category) = &self.category {
            product.category = Some(category.clone());
        }
        product.updated_at = now;
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a persisted sale.
///
/// The only permitted transition is `Finalized → Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Finalized,
    Cancelled,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Finalized
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
///
/// Declaration order is the tie-break order in payment breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    Pix,
    Other,
    /// The menu selection was not recognised.
    Unspecified,
}

impl PaymentMethod {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Other => "Other",
            PaymentMethod::Unspecified => "Unspecified",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    /// Time-based business number, e.g. `20261017143005123456`.
    pub number: String,
    pub timestamp: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// `subtotal - discount`, fixed at creation. May be negative.
    pub final_total_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub notes: Option<String>,
}

impl Sale {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn final_total(&self) -> Money {
        Money::from_cents(self.final_total_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == SaleStatus::Cancelled
    }

    /// The discount exceeded the subtotal when the sale was created.
    #[inline]
    pub fn has_negative_total(&self) -> bool {
        self.final_total_cents < 0
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A persisted line of a sale. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Product price at sale time (frozen).
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`.
    pub subtotal_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Line Item (in-progress sale)
// =============================================================================

/// A line of an in-progress sale.
///
/// ## Design Notes
/// Uses the snapshot pattern: code, name and price are frozen when the line
/// is added, so later catalog edits cannot change what the cashier saw or
/// what the sale records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    /// Code at time of adding (frozen).
    pub code: String,
    /// Name at time of adding (frozen).
    pub name: String,
    pub quantity: i64,
    /// Price at time of adding (frozen).
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl LineItem {
    /// Snapshots `product` at `quantity` units.
    ///
    /// Returns `None` when `price * quantity` does not fit in cents.
    pub fn from_product(product: &Product, quantity: i64) -> Option<Self> {
        let subtotal = product.unit_price().multiply_quantity(quantity)?;
        Some(LineItem {
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            quantity,
            unit_price_cents: product.unit_price_cents,
            subtotal_cents: subtotal.cents(),
        })
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

// =============================================================================
// Sale Draft
// =============================================================================

/// A priced sale ready to be committed.
///
/// Built by [`crate::pricing::checkout`]; `subtotal_cents` always equals the
/// sum of the line subtotals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDraft {
    pub number: String,
    pub timestamp: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub final_total_cents: i64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
}

impl SaleDraft {
    #[inline]
    pub fn final_total(&self) -> Money {
        Money::from_cents(self.final_total_cents)
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
