//! # Voucher Allocation
//!
//! Picks the next `{prefix}{YYYYMMDD}{NNNN}` voucher number inside the
//! caller's unit of work. The caller already holds the write lock, so the
//! read-modify-write below cannot interleave with another allocation.
//!
//! ## Allocators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DailySequenceAllocator (default)                                      │
//! │    voucher_sequences(prefix, date) → last → last + 1 → store           │
//! │    no row yet → seed from the highest existing voucher of that day     │
//! │                                                                         │
//! │  MaxScanAllocator                                                      │
//! │    MAX(voucher_number) over sales of that prefix and day → + 1         │
//! │    stores the result so the daily counter never falls behind           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;

use argent_core::voucher::{format_voucher, next_sequence, parse_sequence, voucher_stem};
use argent_db::{DbResult, SaleRepository, VoucherSequenceRepository};
use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

/// Length of the `NNNN` tail.
const SEQUENCE_DIGITS: usize = 4;

/// Hands out voucher numbers inside a unit of work.
pub trait VoucherAllocator: Send + Sync {
    /// The next unused voucher number for `prefix` on `date`.
    ///
    /// ## Errors
    /// `VoucherExhausted` once `9999` numbers have been issued.
    fn allocate(
        &self,
        conn: &mut SqliteConnection,
        prefix: &str,
        date: NaiveDate,
    ) -> impl Future<Output = DbResult<String>> + Send;
}

/// Highest sequence already used by a sale of `prefix` on `date`.
async fn highest_issued(
    conn: &mut SqliteConnection,
    prefix: &str,
    date: NaiveDate,
) -> DbResult<Option<u32>> {
    let stem = voucher_stem(prefix, date);
    let voucher_len = stem.len() + SEQUENCE_DIGITS;
    let max = SaleRepository::max_voucher_with_stem(conn, &stem, voucher_len).await?;
    Ok(max.and_then(|voucher| parse_sequence(&voucher, prefix, date)))
}

// =============================================================================
// Daily Sequence
// =============================================================================

/// Keeps an explicit counter per `(prefix, date)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailySequenceAllocator;

impl VoucherAllocator for DailySequenceAllocator {
    async fn allocate(
        &self,
        conn: &mut SqliteConnection,
        prefix: &str,
        date: NaiveDate,
    ) -> DbResult<String> {
        let last = match VoucherSequenceRepository::last(conn, prefix, date).await? {
            Some(last) => Some(last),
            // Sales written before the counter existed
            None => highest_issued(conn, prefix, date).await?,
        };

        let sequence = next_sequence(last, prefix, date)?;
        VoucherSequenceRepository::store(conn, prefix, date, sequence).await?;

        let voucher = format_voucher(prefix, date, sequence)?;
        debug!(voucher = %voucher, "Voucher allocated");
        Ok(voucher)
    }
}

// =============================================================================
// Max Scan
// =============================================================================

/// Derives the next number from the sales table alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxScanAllocator;

impl VoucherAllocator for MaxScanAllocator {
    async fn allocate(
        &self,
        conn: &mut SqliteConnection,
        prefix: &str,
        date: NaiveDate,
    ) -> DbResult<String> {
        let last = highest_issued(conn, prefix, date).await?;
        let sequence = next_sequence(last, prefix, date)?;
        VoucherSequenceRepository::store(conn, prefix, date, sequence).await?;

        let voucher = format_voucher(prefix, date, sequence)?;
        debug!(voucher = %voucher, "Voucher allocated by scan");
        Ok(voucher)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use argent_core::{Channel, CoreError};
    use argent_db::{Database, DbConfig};

    use crate::testing::{customer, insert_sale};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    async fn allocate_committed(db: &Database, allocator: &impl VoucherAllocator) -> String {
        let mut tx = db.begin().await.unwrap();
        let voucher = allocator.allocate(&mut tx, "", day()).await.unwrap();
        tx.commit().await.unwrap();
        voucher
    }

    #[tokio::test]
    async fn test_daily_sequence_starts_at_one_and_increments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();

        let first = DailySequenceAllocator.allocate(&mut tx, "REG", day()).await.unwrap();
        let second = DailySequenceAllocator.allocate(&mut tx, "REG", day()).await.unwrap();
        let wholesale = DailySequenceAllocator.allocate(&mut tx, "", day()).await.unwrap();

        assert_eq!(first, "REG202403050001");
        assert_eq!(second, "REG202403050002");
        assert_eq!(wholesale, "202403050001");
    }

    #[tokio::test]
    async fn test_daily_sequence_seeds_from_existing_sales() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(&db, Channel::Wholesale).await;
        insert_sale(&db, &c, "202403050041", day()).await;

        let mut tx = db.begin().await.unwrap();
        let next = DailySequenceAllocator.allocate(&mut tx, "", day()).await.unwrap();
        assert_eq!(next, "202403050042");
    }

    #[tokio::test]
    async fn test_daily_sequence_exhaustion() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        VoucherSequenceRepository::store(&mut tx, "REG", day(), 9999).await.unwrap();

        let err = DailySequenceAllocator.allocate(&mut tx, "REG", day()).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::VoucherExhausted { .. })));

        // Another day is unaffected
        let next_day = day().succ_opt().unwrap();
        let voucher = DailySequenceAllocator.allocate(&mut tx, "REG", next_day).await.unwrap();
        assert_eq!(voucher, "REG202403060001");
    }

    #[tokio::test]
    async fn test_max_scan_ignores_other_prefixes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(&db, Channel::Regular).await;
        insert_sale(&db, &c, "REG202403050007", day()).await;

        let mut tx = db.begin().await.unwrap();
        let wholesale = MaxScanAllocator.allocate(&mut tx, "", day()).await.unwrap();
        let regular = MaxScanAllocator.allocate(&mut tx, "REG", day()).await.unwrap();

        assert_eq!(wholesale, "202403050001");
        assert_eq!(regular, "REG202403050008");
    }

    #[tokio::test]
    async fn test_mixed_allocators_keep_the_counter_in_step() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(&db, Channel::Wholesale).await;

        let first = allocate_committed(&db, &DailySequenceAllocator).await;
        assert_eq!(first, "202403050001");
        insert_sale(&db, &c, &first, day()).await;

        let scanned = allocate_committed(&db, &MaxScanAllocator).await;
        assert_eq!(scanned, "202403050002");
        insert_sale(&db, &c, &scanned, day()).await;

        let next = allocate_committed(&db, &DailySequenceAllocator).await;
        assert_eq!(next, "202403050003");

        let mut conn = db.pool().acquire().await.unwrap();
        let stored = VoucherSequenceRepository::last(&mut conn, "", day()).await.unwrap();
        assert_eq!(stored, Some(3));
    }
}
