//! # Rate Provider
//!
//! Current and historical silver price per gram.

use argent_core::{CoreError, Money, SilverRate};
use argent_db::{Database, DbResult, RateRepository, UpsertOutcome};
use chrono::NaiveDate;
use tracing::info;

/// Default number of rows [`RateProvider::history`] returns.
pub const DEFAULT_HISTORY_LIMIT: i64 = 30;

/// Reads and maintains the silver rate table.
#[derive(Debug, Clone)]
pub struct RateProvider {
    rates: RateRepository,
}

impl RateProvider {
    pub fn new(db: &Database) -> Self {
        RateProvider { rates: db.rates() }
    }

    /// The most recent active rate. `None` is not an error.
    pub async fn current_rate(&self) -> DbResult<Option<SilverRate>> {
        self.rates.current().await
    }

    /// The most recent active rate dated on or before `date`.
    pub async fn rate_as_of(&self, date: NaiveDate) -> DbResult<Option<SilverRate>> {
        self.rates.as_of(date).await
    }

    /// Sets the rate for `date`, replacing any existing value for that day.
    pub async fn set_rate(
        &self,
        date: NaiveDate,
        rate_per_gram: Money,
    ) -> DbResult<(SilverRate, UpsertOutcome)> {
        if !rate_per_gram.is_positive() {
            return Err(CoreError::non_positive("rate_per_gram", rate_per_gram).into());
        }
        let (rate, outcome) = self.rates.upsert(date, rate_per_gram).await?;
        info!(date = %date, rate = %rate_per_gram, outcome = ?outcome, "Silver rate set");
        Ok((rate, outcome))
    }

    /// Active rates, newest first.
    pub async fn history(&self, limit: Option<i64>) -> DbResult<Vec<SilverRate>> {
        self.rates.history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await
    }

    /// Takes the rate for `date` out of service. The row is kept.
    pub async fn deactivate(&self, date: NaiveDate) -> DbResult<()> {
        self.rates.deactivate(date).await?;
        info!(date = %date, "Silver rate deactivated");
        Ok(())
    }
}
