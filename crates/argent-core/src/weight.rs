//! # Weight and Percentage
//!
//! Silver is weighed in grams to three decimal places and priced through two
//! percentage-like measurements (touch and wastage). Both are stored as
//! integers, mirroring how [`Money`](crate::Money) stores paise.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Weight       77.900 g   ──►  77900   milligrams                       │
//! │  Percentage   80.000 %   ──►  80000   thousandths of a percent          │
//! │                                                                         │
//! │  silver = (touch + wastage) × net / 100                                 │
//! │         = (80000 + 2000) × 95000 / 100000  =  77900 mg                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::decimal::{self, DecimalParseError};

/// Milligrams per gram, and thousandths per percent.
const SCALE: u32 = 3;

// =============================================================================
// Weight
// =============================================================================

/// A silver weight in milligrams.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Weight(i64);

impl Weight {
    #[inline]
    pub const fn from_milligrams(mg: i64) -> Self {
        Weight(mg)
    }

    #[inline]
    pub const fn from_grams(grams: i64) -> Self {
        Weight(grams * 1000)
    }

    #[inline]
    pub const fn milligrams(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Weight(0)
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

    /// The weight in grams.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        decimal::to_decimal(self.0, SCALE)
    }

    /// Subtraction that stops at zero instead of going negative.
    #[inline]
    pub const fn saturating_sub(&self, other: Weight) -> Weight {
        if other.0 >= self.0 {
            Weight(0)
        } else {
            Weight(self.0 - other.0)
        }
    }
}

/// Renders grams with three decimals (`77.900`).
impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&decimal::format_units(self.0, SCALE))
    }
}

/// Parses grams with up to three decimal places.
impl FromStr for Weight {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decimal::parse_units(s, SCALE).map(Weight)
    }
}

impl Add for Weight {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Weight(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Weight {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Weight {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Weight(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Weight {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Weight>>(iter: I) -> Self {
        iter.fold(Weight::zero(), Add::add)
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A percentage in thousandths of a percent (`80.5%` is `80_500`).
///
/// Used for touch (purity) and wastage. Values above 100% are legal: touch
/// plus wastage routinely exceeds it for heavily worked pieces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Percentage(i64);

impl Percentage {
    #[inline]
    pub const fn from_millipercent(value: i64) -> Self {
        Percentage(value)
    }

    #[inline]
    pub const fn from_percent(whole: i64) -> Self {
        Percentage(whole * 1000)
    }

    #[inline]
    pub const fn millipercent(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// This percentage of `weight`, rounded half away from zero to the
    /// nearest milligram.
    ///
    /// ## Example
    /// ```rust
    /// use argent_core::{Percentage, Weight};
    ///
    /// let factor = Percentage::from_percent(80) + Percentage::from_percent(2);
    /// let silver = factor.of(Weight::from_grams(95));
    /// assert_eq!(silver.milligrams(), 77_900);
    /// ```
    pub fn of(&self, weight: Weight) -> Weight {
        let fraction = Decimal::new(self.0, SCALE + 2);
        Weight(decimal::product_units(weight.to_decimal(), fraction, SCALE))
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", decimal::format_units(self.0, SCALE))
    }
}

impl FromStr for Percentage {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decimal::parse_units(s, SCALE).map(Percentage)
    }
}

impl Add for Percentage {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Percentage(self.0.saturating_add(other.0))
    }
}

impl Sum for Percentage {
    fn sum<I: Iterator<Item = Percentage>>(iter: I) -> Self {
        iter.fold(Percentage::zero(), Add::add)
    }
}
