//! # Voucher Sequence Repository
//!
//! The last voucher number issued per `(prefix, date)`. Read and written
//! only inside a unit of work that already holds the write lock.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Stateless: every operation runs on the caller's connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoucherSequenceRepository;

impl VoucherSequenceRepository {
    /// The last sequence issued for `prefix` on `date`, if any.
    pub async fn last(
        conn: &mut SqliteConnection,
        prefix: &str,
        date: NaiveDate,
    ) -> DbResult<Option<u32>> {
        let last: Option<u32> = sqlx::query_scalar(
            "SELECT last_sequence FROM voucher_sequences WHERE prefix = ?1 AND voucher_date = ?2",
        )
        .bind(prefix)
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(last)
    }

    /// Records `sequence` as the last one issued for `prefix` on `date`.
    pub async fn store(
        conn: &mut SqliteConnection,
        prefix: &str,
        date: NaiveDate,
        sequence: u32,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO voucher_sequences (prefix, voucher_date, last_sequence)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (prefix, voucher_date) DO UPDATE SET last_sequence = excluded.last_sequence
            "#,
        )
        .bind(prefix)
        .bind(date)
        .bind(sequence)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_store_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut tx = db.begin().await.unwrap();

        assert_eq!(VoucherSequenceRepository::last(&mut tx, "REG", date).await.unwrap(), None);

        VoucherSequenceRepository::store(&mut tx, "REG", date, 1).await.unwrap();
        VoucherSequenceRepository::store(&mut tx, "REG", date, 2).await.unwrap();
        VoucherSequenceRepository::store(&mut tx, "", date, 7).await.unwrap();

        assert_eq!(VoucherSequenceRepository::last(&mut tx, "REG", date).await.unwrap(), Some(2));
        assert_eq!(VoucherSequenceRepository::last(&mut tx, "", date).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_sequence_past_daily_limit_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let err = VoucherSequenceRepository::store(&mut conn, "REG", date, 10_000)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
