//! # Decimal Bridge
//!
//! Quantities are stored as integer counts of their smallest unit, but they
//! arrive and leave as decimal text and their products need one explicit
//! rounding step. Both go through [`rust_decimal::Decimal`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   "5892.50"  ──parse_units(_, 2)──►  589250   (paise)                   │
//! │   "77.9"     ──parse_units(_, 3)──►  77900    (milligrams)              │
//! │                                                                         │
//! │   Decimal × Decimal ──product_units(_, _, scale)──► i64                 │
//! │        rounded MidpointAwayFromZero, saturated at the i64 bounds        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Why a decimal string could not be turned into a unit count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalParseError {
    #[error("value is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotANumber(String),

    #[error("'{value}' has more than {scale} decimal places")]
    TooPrecise { value: String, scale: u32 },

    #[error("'{0}' is out of range")]
    Overflow(String),
}

/// Parses plain decimal text into a count of `10^-scale` units.
///
/// Exponents and surplus fraction digits are rejected, never rounded.
pub fn parse_units(input: &str, scale: u32) -> Result<i64, DecimalParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DecimalParseError::Empty);
    }

    let value = Decimal::from_str_exact(trimmed)
        .map_err(|_| DecimalParseError::NotANumber(trimmed.to_string()))?;
    if value.scale() > scale {
        return Err(DecimalParseError::TooPrecise {
            value: trimmed.to_string(),
            scale,
        });
    }

    value
        .checked_mul(unit_factor(scale))
        .and_then(|units| units.to_i64())
        .ok_or_else(|| DecimalParseError::Overflow(trimmed.to_string()))
}

/// `units` of `10^-scale` as a decimal.
#[inline]
pub fn to_decimal(units: i64, scale: u32) -> Decimal {
    Decimal::new(units, scale)
}

/// Decimal text with exactly `scale` fraction digits (`"5892.50"`).
pub fn format_units(units: i64, scale: u32) -> String {
    to_decimal(units, scale).to_string()
}

/// Rounds `value` half away from zero to `scale` places and returns the
/// unit count, saturating at the i64 bounds.
pub fn round_to_units(value: Decimal, scale: u32) -> i64 {
    value
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(unit_factor(scale))
        .and_then(|units| units.to_i64())
        .unwrap_or_else(|| saturated(value.is_sign_negative()))
}

/// `a × b` rounded to `scale` places, as a unit count.
pub fn product_units(a: Decimal, b: Decimal, scale: u32) -> i64 {
    match a.checked_mul(b) {
        Some(product) => round_to_units(product, scale),
        None => saturated(a.is_sign_negative() != b.is_sign_negative()),
    }
}

fn unit_factor(scale: u32) -> Decimal {
    Decimal::from(10_i64.pow(scale))
}

fn saturated(negative: bool) -> i64 {
    if negative {
        i64::MIN
    } else {
        i64::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("5892.5", 2), Ok(589_250));
        assert_eq!(parse_units("77.9", 3), Ok(77_900));
        assert_eq!(parse_units("80", 3), Ok(80_000));
        assert_eq!(parse_units("-12.345", 3), Ok(-12_345));
        assert_eq!(parse_units("  0.001 ", 3), Ok(1));
        assert_eq!(parse_units("12", 0), Ok(12));
    }

    #[test]
    fn test_parse_units_rejects_bad_text() {
        assert_eq!(parse_units("   ", 2), Err(DecimalParseError::Empty));
        assert!(matches!(parse_units("abc", 2), Err(DecimalParseError::NotANumber(_))));
        assert!(matches!(parse_units("1e3", 2), Err(DecimalParseError::NotANumber(_))));
        assert!(matches!(parse_units("1,000", 2), Err(DecimalParseError::NotANumber(_))));
        assert!(matches!(
            parse_units("1.234", 2),
            Err(DecimalParseError::TooPrecise { scale: 2, .. })
        ));
        assert!(matches!(parse_units("1.5", 0), Err(DecimalParseError::TooPrecise { .. })));
        assert!(matches!(
            parse_units("99999999999999999999", 2),
            Err(DecimalParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_units_keeps_scale() {
        assert_eq!(format_units(589_250, 2), "5892.50");
        assert_eq!(format_units(77_900, 3), "77.900");
        assert_eq!(format_units(-5, 2), "-0.05");
        assert_eq!(format_units(0, 3), "0.000");
        assert_eq!(format_units(42, 0), "42");
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        assert_eq!(round_to_units(Decimal::new(5, 3), 2), 1);
        assert_eq!(round_to_units(Decimal::new(4, 3), 2), 0);
        assert_eq!(round_to_units(Decimal::new(-5, 3), 2), -1);
        assert_eq!(round_to_units(Decimal::new(-4, 3), 2), 0);
        assert_eq!(round_to_units(Decimal::new(15, 3), 2), 2);
    }

    #[test]
    fn test_product_saturates() {
        let huge = to_decimal(i64::MAX, 2);
        assert_eq!(product_units(huge, Decimal::new(i64::MAX, 3), 2), i64::MAX);
        assert_eq!(product_units(-huge, Decimal::new(i64::MAX, 3), 2), i64::MIN);
        assert_eq!(product_units(huge, Decimal::new(2, 0), 2), i64::MAX);
    }
}
