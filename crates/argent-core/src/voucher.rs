//! # Voucher Numbers
//!
//! Formatting and parsing of `{prefix}{YYYYMMDD}{NNNN}` voucher numbers.
//! Allocation (which number comes next, under which lock) lives in
//! argent-billing; this module only knows the shape.
//!
//! ```text
//!   REG 20240305 0007     regular channel, 7th sale of 5 March 2024
//!       20240305 0012     wholesale channel (empty prefix)
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::MAX_DAILY_VOUCHERS;

/// `{prefix}{YYYYMMDD}`, shared by every voucher of one prefix and day.
pub fn voucher_stem(prefix: &str, date: NaiveDate) -> String {
    format!("{}{}", prefix, date.format("%Y%m%d"))
}

/// Builds a voucher number.
///
/// ## Errors
/// [`CoreError::VoucherExhausted`] when `sequence` is above
/// [`MAX_DAILY_VOUCHERS`]; zero is never a valid sequence.
pub fn format_voucher(prefix: &str, date: NaiveDate, sequence: u32) -> CoreResult<String> {
    if sequence == 0 || sequence > MAX_DAILY_VOUCHERS {
        return Err(CoreError::VoucherExhausted {
            prefix: prefix.to_string(),
            date: date.to_string(),
        });
    }
    Ok(format!("{}{:04}", voucher_stem(prefix, date), sequence))
}

/// Extracts the sequence from a voucher of the given prefix and date.
///
/// Returns `None` for vouchers of another prefix or day, or a malformed tail.
pub fn parse_sequence(voucher: &str, prefix: &str, date: NaiveDate) -> Option<u32> {
    let tail = voucher.strip_prefix(&voucher_stem(prefix, date))?;
    if tail.len() != 4 || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// The sequence that follows `last` (the highest one in use, if any).
pub fn next_sequence(last: Option<u32>, prefix: &str, date: NaiveDate) -> CoreResult<u32> {
    let next = last.unwrap_or(0) + 1;
    if next > MAX_DAILY_VOUCHERS {
        return Err(CoreError::VoucherExhausted {
            prefix: prefix.to_string(),
            date: date.to_string(),
        });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_format_voucher() {
        assert_eq!(format_voucher("REG", day(), 7).unwrap(), "REG202403050007");
        assert_eq!(format_voucher("", day(), 1).unwrap(), "202403050001");
        assert_eq!(format_voucher("", day(), 9999).unwrap(), "202403059999");
    }

    #[test]
    fn test_format_voucher_rejects_out_of_range() {
        assert!(matches!(
            format_voucher("", day(), 10_000),
            Err(CoreError::VoucherExhausted { .. })
        ));
        assert!(format_voucher("", day(), 0).is_err());
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("REG202403050042", "REG", day()), Some(42));
        assert_eq!(parse_sequence("202403050042", "", day()), Some(42));
        assert_eq!(parse_sequence("REG202403050042", "", day()), None);
        assert_eq!(parse_sequence("202403060042", "", day()), None);
        assert_eq!(parse_sequence("2024030500x2", "", day()), None);
    }

    #[test]
    fn test_next_sequence() {
        assert_eq!(next_sequence(None, "", day()).unwrap(), 1);
        assert_eq!(next_sequence(Some(41), "", day()).unwrap(), 42);
        assert!(matches!(
            next_sequence(Some(9999), "REG", day()),
            Err(CoreError::VoucherExhausted { prefix, .. }) if prefix == "REG"
        ));
    }
}
