//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With binary floating point:                                            │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A ledger that sums thousands of sale totals drifts by cents.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every price, subtotal, discount and revenue is an i64 of cents.      │
//! │    Text input ("12.50", "7.5%") is parsed as an exact decimal and       │
//! │    rounded to cents exactly once, at the edge.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ledger_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line = price.multiply_quantity(3).unwrap();
//! assert_eq!(line.cents(), 3297);
//!
//! let typed = Money::parse("12,50").unwrap();
//! assert_eq!(typed.cents(), 1250);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: a sale whose discount exceeds its subtotal has a
///   negative final total, and that value must be representable
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money Flows
/// ```text
/// Product.unit_price ──► LineItem.unit_price ──► LineItem.subtotal
///                                                      │
///                         Sale.subtotal ◄──────────────┘
///                              │
///                  Sale.subtotal - Sale.discount = Sale.final_total
///                              │
///                  Reports: revenue, average ticket
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Converts an exact decimal amount to cents, rounding half away from zero.
    ///
    /// Returns `None` when the amount does not fit in an i64 of cents.
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money)
    }

    /// Parses a plain, non-negative decimal amount such as `"12.50"`.
    ///
    /// ## Rules
    /// - Surrounding whitespace is ignored
    /// - A comma is accepted as the decimal separator when no dot is present
    /// - Negative, empty or malformed text yields `None`
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12.5").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse("0,99").unwrap().cents(), 99);
    /// assert!(Money::parse("-1").is_none());
    /// assert!(Money::parse("abc").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let amount = parse_decimal(text)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return None;
        }
        Money::from_decimal(amount)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns the value as an exact decimal of major units (for display
    /// layers that do their own formatting).
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// Returns `None` when the product does not fit in an `i64` of cents.
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).unwrap().cents(), 897);
    /// assert!(unit_price.multiply_quantity(i64::MAX).is_none());
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Computes `pct` percent of this amount, rounded half away from zero.
    ///
    /// Returns `None` if the computation overflows.
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let subtotal = Money::from_cents(10000);
    /// let ten = subtotal.percentage(Decimal::from(10)).unwrap();
    /// assert_eq!(ten.cents(), 1000);
    /// ```
    pub fn percentage(&self, pct: Decimal) -> Option<Money> {
        let share = Decimal::from(self.0)
            .checked_mul(pct)?
            .checked_div(Decimal::ONE_HUNDRED)?;
        share
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Money)
    }

    /// Average of `total` over `count` entries, rounded half away from zero.
    ///
    /// Defined as zero when `count` is zero (an empty period has an average
    /// ticket of zero, not an error).
    ///
    /// ## Example
    /// ```rust
    /// use ledger_core::money::Money;
    ///
    /// assert_eq!(Money::average(Money::from_cents(1000), 3).cents(), 333);
    /// assert_eq!(Money::average(Money::from_cents(1001), 2).cents(), 501);
    /// assert_eq!(Money::average(Money::from_cents(500), 0).cents(), 0);
    /// ```
    pub fn average(total: Money, count: usize) -> Money {
        if count == 0 {
            return Money::zero();
        }
        let n = count as i64;
        let quotient = total.0 / n;
        let remainder = total.0 % n;
        if remainder.abs() * 2 >= n {
            Money(quotient + total.0.signum())
        } else {
            Money(quotient)
        }
    }
}

/// Parses decimal text, accepting `,` as the separator when no `.` is present.
pub(crate) fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(',') && !text.contains('.') {
        Decimal::from_str(&text.replace(',', ".")).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain `major.minor` rendering. Currency symbols and locale formatting
/// belong to the UI collaborator.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
