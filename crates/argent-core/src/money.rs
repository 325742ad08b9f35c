//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    77.9 * 75 + 50 = 5892.500000000001  ❌ WRONG!                        │
//! │                                                                         │
//! │  A ledger that drifts by a fraction of a paisa per sale no longer       │
//! │  replays to the balance it stored.                                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Paise                                            │
//! │    ₹5892.50 is stored as 589250 paise                                   │
//! │    Every product of rate × weight is rounded once, explicitly           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use argent_core::money::Money;
//! use argent_core::Weight;
//!
//! // Create from paise (preferred)
//! let rate = Money::from_paise(7500); // ₹75.00 per gram
//!
//! // Value of 77.9 g of silver at that rate
//! let value = rate.for_weight(Weight::from_milligrams(77_900));
//! assert_eq!(value.paise(), 584_250); // ₹5842.50
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::decimal::{self, DecimalParseError};
use crate::types::TaxRate;
use crate::weight::Weight;

/// Paise per rupee.
const SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (1/100 of a rupee).
///
/// ## Design Decisions
/// - **i64 (signed)**: ledger amounts are signed (payments are negative)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serde**: serialized as the raw integer, never as a float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  SilverRate.rate_per_gram ──► InvoiceLine.item_amount ──► Sale.subtotal │
/// │                                                                         │
/// │  Sale.total_amount ──► LedgerEntry.amount ──► Customer.balance          │
/// │                                                                         │
/// │  EVERY monetary value in the ledger flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use argent_core::money::Money;
    ///
    /// let price = Money::from_paise(1099); // Represents ₹10.99
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Used for the per-sale `balance_amount`, which tracks what is still
    /// payable on one voucher and never goes below zero.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Calculates tax on this amount, rounding half away from zero.
    ///
    /// ## Implementation
    /// `rupees × bps / 10000` in [`Decimal`], rounded once to the paisa.
    ///
    /// ## Example
    /// ```rust
    /// use argent_core::money::Money;
    /// use argent_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_paise(589_250); // ₹5892.50
    /// let cgst = subtotal.calculate_tax(TaxRate::from_bps(150)); // 1.5%
    /// // ₹88.3875 → ₹88.39
    /// assert_eq!(cgst.paise(), 8_839);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let rate = Decimal::new(i64::from(rate.bps()), 4);
        Money(decimal::product_units(self.to_decimal(), rate, SCALE))
    }

    /// Value of `weight` when this amount is a price per gram.
    ///
    /// `rupees_per_gram × grams`, rounded half away from zero.
    pub fn for_weight(&self, weight: Weight) -> Money {
        Money(decimal::product_units(self.to_decimal(), weight.to_decimal(), SCALE))
    }

    /// Charge for `weight` when this amount is a price per kilogram.
    ///
    /// `rupees_per_kg × kilograms`, rounded half away from zero.
    pub fn for_weight_per_kg(&self, weight: Weight) -> Money {
        let kilograms = Decimal::new(weight.milligrams(), 6);
        Money(decimal::product_units(self.to_decimal(), kilograms, SCALE))
    }

    /// The amount in rupees.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        decimal::to_decimal(self.0, SCALE)
    }

    /// Plain decimal rendering without currency symbol (`"5892.50"`).
    pub fn to_decimal_string(&self) -> String {
        decimal::format_units(self.0, SCALE)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as rupees (`₹5892.50`, `-₹3.00`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

/// Parses a rupee amount with up to two decimal places (`"3000"`, `"2142.5"`).
impl FromStr for Money {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decimal::parse_units(s, SCALE).map(Money)
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
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

/// Negation flips the direction of a ledger amount.
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paise() {
        let money = Money::from_paise(589_250);
        assert_eq!(money.paise(), 589_250);
        assert_eq!(money.rupees(), 5892);
        assert_eq!(money.paise_part(), 50);
        assert_eq!(Money::from_rupees(75).paise(), 7_500);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(589_250).to_string(), "₹5892.50");
        assert_eq!(Money::from_paise(500).to_string(), "₹5.00");
        assert_eq!(Money::from_paise(-550).to_string(), "-₹5.50");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("2142.5".parse::<Money>().unwrap(), Money::from_paise(214_250));
        assert_eq!("3000".parse::<Money>().unwrap(), Money::from_rupees(3000));
        assert!("12.345".parse::<Money>().is_err());
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        assert_eq!((-a).paise(), -1000);
        assert_eq!((a * 3).paise(), 3000);
        assert_eq!([a, b, b].iter().sum::<Money>().paise(), 2000);
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Money::from_paise(i64::MAX);
        let min = Money::from_paise(i64::MIN);

        assert_eq!(max + Money::from_paise(1), max);
        assert_eq!(min - Money::from_paise(1), min);
        assert_eq!(-min, max);
        assert_eq!(max * 2, max);

        let mut balance = Money::from_paise(i64::MAX - 5);
        balance += Money::from_rupees(1);
        assert_eq!(balance, max);
        balance -= max;
        balance -= max;
        assert_eq!(balance, Money::from_paise(-i64::MAX));
        assert_eq!([max, max].iter().sum::<Money>(), max);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_paise(-1).floor_zero(), Money::zero());
        assert_eq!(Money::from_paise(42).floor_zero(), Money::from_paise(42));
    }

    #[test]
    fn test_for_weight() {
        // 77.900 g at ₹75.00/g = ₹5842.50
        let rate = Money::from_rupees(75);
        assert_eq!(rate.for_weight(Weight::from_milligrams(77_900)).paise(), 584_250);

        // 10.000 g at ₹75.00/g = ₹750.00
        assert_eq!(rate.for_weight(Weight::from_grams(10)).paise(), 75_000);

        // 0.001 g at ₹0.05/g = 0.005 paise → rounds to 0
        assert_eq!(Money::from_paise(5).for_weight(Weight::from_milligrams(1)).paise(), 0);
    }

    #[test]
    fn test_for_weight_per_kg() {
        // 100 g gross at ₹500/kg labour = ₹50.00
        let labour = Money::from_rupees(500);
        assert_eq!(labour.for_weight_per_kg(Weight::from_grams(100)).paise(), 5_000);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        let amount = Money::from_paise(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).paise(), 83);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)).paise(), 100);

        // ₹5892.50 × 1.5% = ₹88.3875 → ₹88.39
        let subtotal = Money::from_paise(589_250);
        assert_eq!(subtotal.calculate_tax(TaxRate::from_bps(150)).paise(), 8_839);
        assert_eq!((-subtotal).calculate_tax(TaxRate::from_bps(150)).paise(), -8_839);
    }

    #[test]
    fn test_decimal_view() {
        let money = Money::from_paise(589_250);
        assert_eq!(money.to_decimal(), Decimal::new(589_250, 2));
        assert_eq!(money.to_decimal_string(), "5892.50");
        assert_eq!(Money::from_paise(-5).to_decimal_string(), "-0.05");
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_paise(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().paise(), 100);
    }
}
