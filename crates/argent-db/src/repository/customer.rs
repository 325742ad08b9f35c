//! # Customer Repository
//!
//! Database operations for customers of both channels.
//!
//! ## Balance Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  customers.balance is written ONLY through set_balance(), and only     │
//! │  from inside a ledger unit of work. update() never touches it.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argent_core::{Channel, Customer, Money};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const CUSTOMER_COLUMNS: &str = "id, channel, name, phone, email, address, gst_number, \
                                balance, is_active, created_at, updated_at";

/// Largest page a listing returns.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Filter for [`CustomerRepository::search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerFilter {
    pub channel: Channel,
    /// Matches name or phone, case-insensitive substring.
    pub query: Option<String>,
    pub include_inactive: bool,
    /// 1-based.
    pub page: i64,
    pub limit: i64,
}

impl CustomerFilter {
    pub fn new(channel: Channel) -> Self {
        CustomerFilter {
            channel,
            query: None,
            include_inactive: false,
            page: 1,
            limit: 50,
        }
    }
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    // =========================================================================
    // Pool Operations
    // =========================================================================

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Finds a customer of `channel` by normalized phone.
    pub async fn find_by_phone(&self, channel: Channel, phone: &str) -> DbResult<Option<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE channel = ?1 AND phone = ?2 \
             ORDER BY created_at LIMIT 1",
            CUSTOMER_COLUMNS
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(channel)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, channel = %customer.channel, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, channel, name, phone, email, address, gst_number,
                balance, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&customer.id)
        .bind(customer.channel)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.gst_number)
        .bind(customer.balance)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes contact details and the active flag. The balance is left alone.
    pub async fn update(&self, customer: &Customer) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2,
                phone = ?3,
                email = ?4,
                address = ?5,
                gst_number = ?6,
                is_active = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.gst_number)
        .bind(customer.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }
        Ok(())
    }

    /// Soft-deletes a customer.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE customers SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Hard-deletes a customer. Fails with a foreign key violation while any
    /// sale or ledger entry still references them.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    /// Searches customers, newest first. Returns the page and the total
    /// number of matches.
    pub async fn search(&self, filter: &CustomerFilter) -> DbResult<(Vec<Customer>, i64)> {
        let pattern = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.to_lowercase()));
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = (filter.page.max(1) - 1) * limit;

        const WHERE: &str = "WHERE channel = ?1 \
             AND (?2 IS NULL OR lower(name) LIKE ?2 OR phone LIKE ?2) \
             AND (?3 = 1 OR is_active = 1)";

        let sql = format!(
            "SELECT {} FROM customers {} ORDER BY created_at DESC, id LIMIT ?4 OFFSET ?5",
            CUSTOMER_COLUMNS, WHERE
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(filter.channel)
            .bind(&pattern)
            .bind(filter.include_inactive)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM customers {}", WHERE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.channel)
            .bind(&pattern)
            .bind(filter.include_inactive)
            .fetch_one(&self.pool)
            .await?;

        Ok((customers, total))
    }

    /// Active customers, optionally of one channel.
    pub async fn count_active(&self, channel: Option<Channel>) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers WHERE is_active = 1 AND (?1 IS NULL OR channel = ?1)",
        )
        .bind(channel)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Sum of positive cached balances on a channel.
    pub async fn outstanding_by_field(&self, channel: Channel) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(balance), 0) FROM customers WHERE channel = ?1 AND balance > 0",
        )
        .bind(channel)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_paise(total))
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    /// Takes the database write lock on behalf of a unit of work that is about
    /// to change this customer's balance.
    ///
    /// Must be the first statement of the transaction. Returns `false` when
    /// the customer doesn't exist.
    pub async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE customers SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reads a customer inside a unit of work.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(customer)
    }

    /// Writes the cached running balance.
    pub async fn set_balance(
        conn: &mut SqliteConnection,
        id: &str,
        balance: Money,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET balance = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(balance)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use crate::repository::test_support::customer;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = customer(Channel::Wholesale, "Ramesh Jewellers", "9876543210");
        db.customers().insert(&c).await.unwrap();

        let loaded = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Ramesh Jewellers");
        assert_eq!(loaded.channel, Channel::Wholesale);
        assert_eq!(loaded.balance, Money::zero());

        let by_phone = db
            .customers()
            .find_by_phone(Channel::Wholesale, "9876543210")
            .await
            .unwrap();
        assert_eq!(by_phone.map(|c| c.id), Some(c.id));
    }

    #[tokio::test]
    async fn test_wholesale_phone_is_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers()
            .insert(&customer(Channel::Wholesale, "A", "9876543210"))
            .await
            .unwrap();

        let err = db
            .customers()
            .insert(&customer(Channel::Wholesale, "B", "9876543210"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Regular customers may share a phone with a wholesale one
        db.customers()
            .insert(&customer(Channel::Regular, "C", "9876543210"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_leaves_balance_alone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut c = customer(Channel::Wholesale, "A", "9876543210");
        db.customers().insert(&c).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        CustomerRepository::set_balance(&mut conn, &c.id, Money::from_rupees(500))
            .await
            .unwrap();
        drop(conn);

        c.name = "A Renamed".to_string();
        c.balance = Money::zero();
        db.customers().update(&c).await.unwrap();

        let loaded = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "A Renamed");
        assert_eq!(loaded.balance, Money::from_rupees(500));
    }

    #[tokio::test]
    async fn test_search_filters_and_paginates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for i in 0..5 {
            let phone = format!("900000000{}", i);
            let shop = customer(Channel::Regular, &format!("Shop {}", i), &phone);
            db.customers().insert(&shop).await.unwrap();
        }
        let gone = customer(Channel::Regular, "Closed Shop", "9111111111");
        db.customers().insert(&gone).await.unwrap();
        db.customers().deactivate(&gone.id).await.unwrap();

        let mut filter = CustomerFilter::new(Channel::Regular);
        filter.limit = 2;
        let (page, total) = db.customers().search(&filter).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 5);

        filter.include_inactive = true;
        filter.query = Some("closed".to_string());
        let (page, total) = db.customers().search(&filter).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, gone.id);

        assert_eq!(db.customers().count_active(Some(Channel::Regular)).await.unwrap(), 5);
        assert_eq!(db.customers().count_active(Some(Channel::Wholesale)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_touch_reports_missing_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        assert!(!CustomerRepository::touch(&mut tx, "missing").await.unwrap());
    }
}
