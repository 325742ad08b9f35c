//! # Silver Rate Repository
//!
//! One row per date. History is never deleted: a rate is replaced by
//! upserting its date, or switched off with `deactivate`.

use argent_core::{Money, SilverRate};
use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const RATE_COLUMNS: &str = "id, rate_date, rate_per_gram, is_active, created_at, updated_at";

/// Whether an upsert created the date's row or replaced its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Repository for silver rate database operations.
#[derive(Debug, Clone)]
pub struct RateRepository {
    pool: SqlitePool,
}

impl RateRepository {
    /// Creates a new RateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RateRepository { pool }
    }

    /// The most recent active rate, if any.
    pub async fn current(&self) -> DbResult<Option<SilverRate>> {
        let sql = format!(
            "SELECT {} FROM silver_rates WHERE is_active = 1 \
             ORDER BY rate_date DESC LIMIT 1",
            RATE_COLUMNS
        );
        let rate = sqlx::query_as::<_, SilverRate>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rate)
    }

    /// The most recent active rate dated on or before `date`.
    pub async fn as_of(&self, date: NaiveDate) -> DbResult<Option<SilverRate>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_as_of(&mut conn, date).await
    }

    /// Active rates, newest first.
    pub async fn history(&self, limit: i64) -> DbResult<Vec<SilverRate>> {
        let sql = format!(
            "SELECT {} FROM silver_rates WHERE is_active = 1 \
             ORDER BY rate_date DESC LIMIT ?1",
            RATE_COLUMNS
        );
        let rates = sqlx::query_as::<_, SilverRate>(&sql)
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;
        Ok(rates)
    }

    /// Inserts or replaces the rate for `date` and marks it active.
    pub async fn upsert(
        &self,
        date: NaiveDate,
        rate_per_gram: Money,
    ) -> DbResult<(SilverRate, UpsertOutcome)> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let updated = sqlx::query(
            "UPDATE silver_rates SET rate_per_gram = ?2, is_active = 1, updated_at = ?3 \
             WHERE rate_date = ?1",
        )
        .bind(date)
        .bind(rate_per_gram)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let outcome = if updated.rows_affected() > 0 {
            UpsertOutcome::Updated
        } else {
            sqlx::query(
                "INSERT INTO silver_rates \
                 (id, rate_date, rate_per_gram, is_active, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(date)
            .bind(rate_per_gram)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            UpsertOutcome::Created
        };

        let sql = format!("SELECT {} FROM silver_rates WHERE rate_date = ?1", RATE_COLUMNS);
        let rate = sqlx::query_as::<_, SilverRate>(&sql)
            .bind(date)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(date = %date, rate = %rate_per_gram, outcome = ?outcome, "Silver rate stored");
        Ok((rate, outcome))
    }

    /// Marks the rate for `date` inactive.
    pub async fn deactivate(&self, date: NaiveDate) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE silver_rates SET is_active = 0, updated_at = ?2 WHERE rate_date = ?1",
        )
        .bind(date)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Silver rate", date.to_string()));
        }
        Ok(())
    }

    /// Rate lookup inside a unit of work.
    pub async fn fetch_as_of(
        conn: &mut SqliteConnection,
        date: NaiveDate,
    ) -> DbResult<Option<SilverRate>> {
        let sql = format!(
            "SELECT {} FROM silver_rates WHERE is_active = 1 AND rate_date <= ?1 \
             ORDER BY rate_date DESC LIMIT 1",
            RATE_COLUMNS
        );
        let rate = sqlx::query_as::<_, SilverRate>(&sql)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(rate)
    }
}
