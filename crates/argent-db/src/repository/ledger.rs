//! # Ledger Repository
//!
//! Storage for the append-only ledger. Rows are only ever inserted; the
//! schema's triggers reject UPDATE and DELETE.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq is an AUTOINCREMENT key assigned at insert. It is the canonical   │
//! │  append order of a customer's entries: two entries written in the same │
//! │  second still chain in the order they were written.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argent_core::{Channel, LedgerEntry, Money, Weight};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

const ENTRY_COLUMNS: &str = "seq, id, customer_id, sale_id, kind, amount, silver_weight, \
                             payment_mode, reference_number, notes, balance_before, \
                             balance_after, created_by, transaction_date";

/// Payments received over a period, cash and silver separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct ReceivedTotals {
    pub payment_count: i64,
    pub cash: Money,
    pub silver_value: Money,
    pub silver_weight: Weight,
}

/// Repository for ledger entries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// A customer's entries in append order, optionally limited to
    /// `[from, to)` on `transaction_date`.
    pub async fn entries_for(
        &self,
        customer_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_for_customer(&mut conn, customer_id, from, to).await
    }

    /// Entries linked to one sale, in append order.
    pub async fn entries_for_sale(&self, sale_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE sale_id = ?1 ORDER BY seq",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Whether the customer has any ledger history.
    pub async fn has_entries(&self, customer_id: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM ledger_entries WHERE customer_id = ?1 LIMIT 1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Sum of entry amounts for a customer, read outside a unit of work.
    pub async fn balance_by_sum(&self, customer_id: &str) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        Self::sum_amount(&mut conn, customer_id).await
    }

    /// Sum of positive ledger-derived balances on a channel.
    pub async fn outstanding_by_sum(&self, channel: Channel) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(balance), 0) FROM (
                SELECT SUM(e.amount) AS balance
                FROM ledger_entries e
                JOIN customers c ON c.id = e.customer_id
                WHERE c.channel = ?1
                GROUP BY e.customer_id
            ) WHERE balance > 0
            "#,
        )
        .bind(channel)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_paise(total))
    }

    /// Payment and silver-payment entries for a channel's customers in
    /// `[from, to)`.
    pub async fn received_between(
        &self,
        channel: Channel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<ReceivedTotals> {
        let totals = sqlx::query_as::<_, ReceivedTotals>(
            r#"
            SELECT
                COUNT(*) AS payment_count,
                COALESCE(-SUM(CASE WHEN e.kind = 'payment' THEN e.amount ELSE 0 END), 0) AS cash,
                COALESCE(-SUM(CASE WHEN e.kind = 'silver_payment' THEN e.amount ELSE 0 END), 0)
                    AS silver_value,
                COALESCE(SUM(e.silver_weight), 0) AS silver_weight
            FROM ledger_entries e
            JOIN customers c ON c.id = e.customer_id
            WHERE c.channel = ?1
              AND e.kind IN ('payment', 'silver_payment')
              AND julianday(e.transaction_date) >= julianday(?2)
              AND julianday(e.transaction_date) < julianday(?3)
            "#,
        )
        .bind(channel)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    /// Appends an entry and returns the `seq` it was given. The `seq` field
    /// of `entry` is ignored.
    pub async fn insert(conn: &mut SqliteConnection, entry: &LedgerEntry) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, customer_id, sale_id, kind, amount, silver_weight,
                payment_mode, reference_number, notes,
                balance_before, balance_after, created_by, transaction_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.customer_id)
        .bind(&entry.sale_id)
        .bind(entry.kind)
        .bind(entry.amount)
        .bind(entry.silver_weight)
        .bind(entry.payment_mode)
        .bind(&entry.reference_number)
        .bind(&entry.notes)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(&entry.created_by)
        .bind(entry.transaction_date)
        .execute(&mut *conn)
        .await?;

        let seq = result.last_insert_rowid();
        debug!(
            seq,
            customer_id = %entry.customer_id,
            kind = %entry.kind,
            amount = %entry.amount,
            "Ledger entry appended"
        );
        Ok(seq)
    }

    /// Sum of all entry amounts for a customer.
    pub async fn sum_amount(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(Money::from_paise(total))
    }

    /// The most recent entry for a customer.
    pub async fn last_entry(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE customer_id = ?1 ORDER BY seq DESC LIMIT 1",
            ENTRY_COLUMNS
        );
        let entry = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(customer_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(entry)
    }

    /// A customer's entries in append order.
    pub async fn fetch_for_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<LedgerEntry>> {
        // transaction_date is RFC 3339 text; julianday() compares instants
        // regardless of how many fractional digits were written.
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE customer_id = ?1 \
             AND (?2 IS NULL OR julianday(transaction_date) >= julianday(?2)) \
             AND (?3 IS NULL OR julianday(transaction_date) < julianday(?3)) \
             ORDER BY seq",
            ENTRY_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(customer_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut *conn)
            .await?;
        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
