//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one unit of work)                                          │
//! │     └── insert() + insert_items() → Sale { status: derived }          │
//! │                                                                         │
//! │  2. PAYMENTS                                                           │
//! │     └── touch() → update_payment() → paid/balance/status rewritten    │
//! │                                                                         │
//! │  3. SILVER RETURN (wholesale)                                          │
//! │     └── touch() → update_silver_return()                               │
//! │                                                                         │
//! │  4. (OPTIONAL) CANCEL                                                  │
//! │     └── cancel() → Sale { status: Cancelled, balance_amount: 0 }       │
//! │                                                                         │
//! │  Items are written once and never updated.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argent_core::{Channel, Money, Sale, SaleItem, SaleStatus, SilverReturnStatus, Weight};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::customer::MAX_PAGE_SIZE;

const SALE_COLUMNS: &str = "id, voucher_number, customer_id, channel, sale_date, silver_rate, \
     total_net_weight, total_wastage, total_silver_weight, total_labor_charges, subtotal, \
     tax_applicable, cgst_rate, sgst_rate, cgst, sgst, total_amount, \
     paid_amount, paid_silver, balance_amount, previous_balance, closing_balance, status, \
     silver_to_return, silver_returned, silver_return_status, \
     notes, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, position, product_id, description, pieces, \
     gross_weight, stone_weight, net_weight, wastage, touch, labor_rate_per_kg, \
     silver_weight, labor_charges, item_amount, created_at";

// Shared by list() and totals(). Dates compare as ISO text.
const FILTER_WHERE: &str = "WHERE (?1 IS NULL OR customer_id = ?1) \
     AND (?2 IS NULL OR channel = ?2) \
     AND (?3 IS NULL OR sale_date >= ?3) \
     AND (?4 IS NULL OR sale_date <= ?4) \
     AND (?5 IS NULL OR status = ?5)";

/// Filter for [`SaleRepository::list`] and [`SaleRepository::totals`].
///
/// Dates are inclusive on both ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleFilter {
    pub customer_id: Option<String>,
    pub channel: Option<Channel>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<SaleStatus>,
    /// 1-based. Ignored by `totals`.
    pub page: i64,
    /// Ignored by `totals`.
    pub limit: i64,
}

impl SaleFilter {
    pub fn for_channel(channel: Channel) -> Self {
        SaleFilter {
            channel: Some(channel),
            page: 1,
            limit: 50,
            ..Default::default()
        }
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }
}

/// Aggregates over the non-cancelled sales matching a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct SaleTotals {
    pub sale_count: i64,
    pub total_amount: Money,
    pub total_silver_weight: Weight,
    pub total_labor_charges: Money,
    pub total_tax: Money,
    pub paid_amount: Money,
    pub paid_silver: Weight,
    /// Silver still owed back on pending or partial returns.
    pub pending_silver_return: Weight,
    pub returned_silver: Weight,
}

/// New payment figures for a sale.
#[derive(Debug, Clone, Copy)]
pub struct PaymentUpdate {
    pub paid_amount: Money,
    pub paid_silver: Weight,
    pub balance_amount: Money,
    pub closing_balance: Money,
    pub status: SaleStatus,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Pool Operations
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets a sale by its voucher number.
    pub async fn get_by_voucher(&self, voucher_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE voucher_number = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(voucher_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Gets all items for a sale in invoice order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY position",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Lists sales newest first. Returns the page and the total match count.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<(Vec<Sale>, i64)> {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (filter.page.max(1) - 1) * limit;

        let sql = format!(
            "SELECT {} FROM sales {} \
             ORDER BY sale_date DESC, voucher_number DESC LIMIT ?6 OFFSET ?7",
            SALE_COLUMNS, FILTER_WHERE
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(&filter.customer_id)
            .bind(filter.channel)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM sales {}", FILTER_WHERE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&filter.customer_id)
            .bind(filter.channel)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;

        Ok((sales, total))
    }

    /// Sums the non-cancelled sales matching `filter`.
    pub async fn totals(&self, filter: &SaleFilter) -> DbResult<SaleTotals> {
        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS sale_count,
                COALESCE(SUM(total_amount), 0) AS total_amount,
                COALESCE(SUM(total_silver_weight), 0) AS total_silver_weight,
                COALESCE(SUM(total_labor_charges), 0) AS total_labor_charges,
                COALESCE(SUM(cgst + sgst), 0) AS total_tax,
                COALESCE(SUM(paid_amount), 0) AS paid_amount,
                COALESCE(SUM(paid_silver), 0) AS paid_silver,
                COALESCE(SUM(CASE WHEN silver_return_status IN ('pending', 'partial')
                                  THEN silver_to_return - silver_returned ELSE 0 END), 0)
                    AS pending_silver_return,
                COALESCE(SUM(silver_returned), 0) AS returned_silver
            FROM sales {} AND status <> 'cancelled'
            "#,
            FILTER_WHERE
        );
        let totals = sqlx::query_as::<_, SaleTotals>(&sql)
            .bind(&filter.customer_id)
            .bind(filter.channel)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.status)
            .fetch_one(&self.pool)
            .await?;
        Ok(totals)
    }

    /// Whether a customer has any sales.
    pub async fn customer_has_sales(&self, customer_id: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sales WHERE customer_id = ?1 LIMIT 1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    /// Takes the database write lock for a unit of work on this sale.
    ///
    /// Must be the first statement of the transaction. Returns `false` when
    /// the sale doesn't exist.
    pub async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reads a sale inside a unit of work.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(sale)
    }

    /// Inserts a sale header.
    pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, voucher_number = %sale.voucher_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, voucher_number, customer_id, channel, sale_date, silver_rate,
                total_net_weight, total_wastage, total_silver_weight, total_labor_charges, subtotal,
                tax_applicable, cgst_rate, sgst_rate, cgst, sgst, total_amount,
                paid_amount, paid_silver, balance_amount, previous_balance, closing_balance, status,
                silver_to_return, silver_returned, silver_return_status,
                notes, created_by, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23,
                ?24, ?25, ?26,
                ?27, ?28, ?29, ?30
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.voucher_number)
        .bind(&sale.customer_id)
        .bind(sale.channel)
        .bind(sale.sale_date)
        .bind(sale.silver_rate)
        .bind(sale.total_net_weight)
        .bind(sale.total_wastage)
        .bind(sale.total_silver_weight)
        .bind(sale.total_labor_charges)
        .bind(sale.subtotal)
        .bind(sale.tax_applicable)
        .bind(sale.cgst_rate)
        .bind(sale.sgst_rate)
        .bind(sale.cgst)
        .bind(sale.sgst)
        .bind(sale.total_amount)
        .bind(sale.paid_amount)
        .bind(sale.paid_silver)
        .bind(sale.balance_amount)
        .bind(sale.previous_balance)
        .bind(sale.closing_balance)
        .bind(sale.status)
        .bind(sale.silver_to_return)
        .bind(sale.silver_returned)
        .bind(sale.silver_return_status)
        .bind(&sale.notes)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a sale's items.
    pub async fn insert_items(conn: &mut SqliteConnection, items: &[SaleItem]) -> DbResult<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, position, product_id, description, pieces,
                    gross_weight, stone_weight, net_weight, wastage, touch, labor_rate_per_kg,
                    silver_weight, labor_charges, item_amount, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(item.position)
            .bind(&item.product_id)
            .bind(&item.description)
            .bind(item.pieces)
            .bind(item.gross_weight)
            .bind(item.stone_weight)
            .bind(item.net_weight)
            .bind(item.wastage)
            .bind(item.touch)
            .bind(item.labor_rate_per_kg)
            .bind(item.silver_weight)
            .bind(item.labor_charges)
            .bind(item.item_amount)
            .bind(item.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Rewrites a sale's payment figures.
    pub async fn update_payment(
        conn: &mut SqliteConnection,
        id: &str,
        update: &PaymentUpdate,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                paid_amount = ?2,
                paid_silver = ?3,
                balance_amount = ?4,
                closing_balance = ?5,
                status = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.paid_amount)
        .bind(update.paid_silver)
        .bind(update.balance_amount)
        .bind(update.closing_balance)
        .bind(update.status)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    /// Records returned silver.
    pub async fn update_silver_return(
        conn: &mut SqliteConnection,
        id: &str,
        silver_returned: Weight,
        status: SilverReturnStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales SET silver_returned = ?2, silver_return_status = ?3, updated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(id)
        .bind(silver_returned)
        .bind(status)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    /// Marks a sale cancelled. Its balance drops to zero.
    pub async fn cancel(
        conn: &mut SqliteConnection,
        id: &str,
        closing_balance: Money,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sales SET status = 'cancelled', balance_amount = 0, closing_balance = ?2, \
             updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(closing_balance)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }
        Ok(())
    }

    /// Highest voucher number beginning with `stem` and exactly
    /// `voucher_len` characters long.
    pub async fn max_voucher_with_stem(
        conn: &mut SqliteConnection,
        stem: &str,
        voucher_len: usize,
    ) -> DbResult<Option<String>> {
        let max: Option<String> = sqlx::query_scalar(
            "SELECT MAX(voucher_number) FROM sales \
             WHERE substr(voucher_number, 1, length(?1)) = ?1 AND length(voucher_number) = ?2",
        )
        .bind(stem)
        .bind(voucher_len as i64)
        .fetch_one(&mut *conn)
        .await?;
        Ok(max)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
