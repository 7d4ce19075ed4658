//! # Pricing & Discount Resolution
//!
//! Turns a finished list of line items, the cashier's raw discount text and
//! a payment menu choice into a [`SaleDraft`] ready to commit.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Vec<LineItem> ──► subtotal = Σ line.subtotal                          │
//! │                         │                                               │
//! │  "10%" / "12,50" ──► Discount::parse ──► discount (cents)              │
//! │                         │                                               │
//! │  "1".."5" ──► PaymentMethod::from_menu_choice                          │
//! │                         │                                               │
//! │                         ▼                                               │
//! │               final_total = subtotal - discount   (no floor)           │
//! │                         │                                               │
//! │  SaleStamp ─────────────┴──► SaleDraft { number, timestamp, ... }      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount parsing fails open: malformed, empty or negative input is a zero
//! discount. Nothing else in the engine defaults silently.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{parse_decimal, Money};
use crate::types::{LineItem, PaymentMethod, SaleDraft};

// =============================================================================
// Discount
// =============================================================================

/// A parsed discount request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discount {
    None,
    /// Fixed amount off the subtotal.
    Amount(Money),
    /// Percentage of the subtotal, e.g. `10` for 10%.
    Percent(Decimal),
}

impl Discount {
    /// Parses cashier input.
    ///
    /// ## Rules
    /// - Trailing `%` means a percentage of the subtotal
    /// - Anything else is a plain amount
    /// - `,` is accepted as the decimal separator when no `.` is present
    /// - Empty, malformed or negative input is [`Discount::None`]
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    /// use ledger_core::pricing::Discount;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Discount::parse("10%"), Discount::Percent(Decimal::from(10)));
    /// assert_eq!(Discount::parse("12,50"), Discount::Amount(Money::from_cents(1250)));
    /// assert_eq!(Discount::parse("abc"), Discount::None);
    /// assert_eq!(Discount::parse("-5"), Discount::None);
    /// ```
    pub fn parse(input: &str) -> Discount {
        let input = input.trim();
        if input.is_empty() {
            return Discount::None;
        }

        if let Some(pct) = input.strip_suffix('%') {
            return match parse_decimal(pct) {
                Some(p) if p.is_sign_positive() && !p.is_zero() => Discount::Percent(p),
                _ => Discount::None,
            };
        }

        match Money::parse(input) {
            Some(amount) if amount.is_positive() => Discount::Amount(amount),
            _ => Discount::None,
        }
    }

    /// The discount in cents for a given subtotal.
    ///
    /// A percentage whose result overflows is treated as no discount.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        match self {
            Discount::None => Money::zero(),
            Discount::Amount(amount) => *amount,
            Discount::Percent(pct) => subtotal.percentage(*pct).unwrap_or_default(),
        }
    }
}

// =============================================================================
// Payment Method Menu
// =============================================================================

impl PaymentMethod {
    /// Maps the payment menu selection to a method.
    ///
    /// ```text
    /// "1" Cash   "2" Debit Card   "3" Credit Card   "4" PIX   "5" Other
    /// anything else → Unspecified
    /// ```
    pub fn from_menu_choice(choice: &str) -> PaymentMethod {
        match choice.trim() {
            "1" => PaymentMethod::Cash,
            "2" => PaymentMethod::DebitCard,
            "3" => PaymentMethod::CreditCard,
            "4" => PaymentMethod::Pix,
            "5" => PaymentMethod::Other,
            _ => PaymentMethod::Unspecified,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Output of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedSale {
    pub subtotal: Money,
    pub discount: Money,
    /// `subtotal - discount`. Negative when the discount exceeds the
    /// subtotal; callers decide whether to warn.
    pub final_total: Money,
    pub payment_method: PaymentMethod,
}

impl PricedSale {
    pub fn has_negative_total(&self) -> bool {
        self.final_total.is_negative()
    }
}

/// Resolves the discount and payment method for a subtotal.
///
/// ## Example
/// ```rust
/// use ledger_core::money::Money;
/// use ledger_core::pricing::resolve;
/// use ledger_core::PaymentMethod;
///
/// let priced = resolve(Money::from_cents(10000), "10%", "4");
/// assert_eq!(priced.discount.cents(), 1000);
/// assert_eq!(priced.final_total.cents(), 9000);
/// assert_eq!(priced.payment_method, PaymentMethod::Pix);
/// ```
pub fn resolve(subtotal: Money, discount_input: &str, payment_choice: &str) -> PricedSale {
    let discount = Discount::parse(discount_input).amount_for(subtotal);
    PricedSale {
        subtotal,
        discount,
        final_total: subtotal - discount,
        payment_method: PaymentMethod::from_menu_choice(payment_choice),
    }
}

// =============================================================================
// Sale Identity
// =============================================================================

/// Generates a sale number from its creation instant.
///
/// Format: `yyyyMMddHHmmss` followed by six digits of microseconds, in the
/// time zone of `instant`. Two sales only collide when created in the same
/// microsecond; the store rejects the second through its unique index.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use ledger_core::pricing::generate_sale_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 17, 14, 30, 5).unwrap();
/// assert_eq!(generate_sale_number(&at), "20261017143005000000");
/// ```
pub fn generate_sale_number<Tz>(instant: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}{:06}",
        instant.format("%Y%m%d%H%M%S"),
        instant.timestamp_subsec_micros() % 1_000_000
    )
}

/// Number and timestamp of a sale about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleStamp {
    pub number: String,
    pub timestamp: DateTime<Utc>,
}

impl SaleStamp {
    /// Stamps a sale created at `instant`. The number uses the wall clock of
    /// `instant`'s zone; the timestamp is stored in UTC.
    pub fn at<Tz>(instant: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        SaleStamp {
            number: generate_sale_number(&instant),
            timestamp: instant.with_timezone(&Utc),
        }
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// Prices finished line items into a [`SaleDraft`].
///
/// The subtotal is always recomputed from the lines, so
/// `draft.subtotal_cents == Σ item.subtotal_cents` holds by construction.
/// Blank notes are stored as `None`.
pub fn checkout(
    items: Vec<LineItem>,
    discount_input: &str,
    payment_choice: &str,
    notes: Option<String>,
    stamp: SaleStamp,
) -> CoreResult<SaleDraft> {
    if items.is_empty() {
        return Err(CoreError::EmptySale);
    }

    let subtotal: Money = items.iter().map(LineItem::subtotal).sum();
    let priced = resolve(subtotal, discount_input, payment_choice);
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(SaleDraft {
        number: stamp.number,
        timestamp: stamp.timestamp,
        subtotal_cents: priced.subtotal.cents(),
        discount_cents: priced.discount.cents(),
        final_total_cents: priced.final_total.cents(),
        payment_method: priced.payment_method,
        notes,
        items,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
