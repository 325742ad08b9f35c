//! # Ledger Engine
//!
//! The balance-of-record keeper. Every change to what a customer owes goes
//! through [`LedgerEngine::apply_delta`], inside the caller's transaction.
//!
//! ## One Engine, Two Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       apply_delta(conn, channel, delta)                 │
//! │                                                                         │
//! │  (a) before = current balance                                          │
//! │        cached-field → customers.balance                                │
//! │        derived-sum  → SUM(ledger_entries.amount)                       │
//! │  (b) after  = before + delta.amount                                    │
//! │  (c) cached-field → customers.balance = after                          │
//! │      derived-sum  → nothing to write                                   │
//! │  (d) append LedgerEntry { before, after, amount, kind, ... }           │
//! │                                                                         │
//! │  (c) and (d) share the caller's transaction: both commit or neither.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argent_core::{
    BalanceStrategy, Channel, CoreError, Customer, EntryKind, LedgerEntry, Money, PaymentMode,
    Weight,
};
use argent_db::{CustomerRepository, Database, DbResult, LedgerRepository};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BalanceSettings;

// =============================================================================
// Delta
// =============================================================================

/// One signed change to a customer's balance, before it is written.
#[derive(Debug, Clone)]
pub struct LedgerDelta {
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub kind: EntryKind,
    /// Positive increases what the customer owes.
    pub amount: Money,
    pub silver_weight: Weight,
    pub payment_mode: Option<PaymentMode>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

impl LedgerDelta {
    pub fn new(customer_id: &str, kind: EntryKind, amount: Money, created_by: &str) -> Self {
        LedgerDelta {
            customer_id: customer_id.to_string(),
            sale_id: None,
            kind,
            amount,
            silver_weight: Weight::zero(),
            payment_mode: None,
            reference_number: None,
            notes: None,
            created_by: created_by.to_string(),
        }
    }

    pub fn for_sale(mut self, sale_id: &str) -> Self {
        self.sale_id = Some(sale_id.to_string());
        self
    }

    pub fn silver(mut self, weight: Weight) -> Self {
        self.silver_weight = weight;
        self
    }

    pub fn mode(mut self, mode: PaymentMode) -> Self {
        self.payment_mode = Some(mode);
        self
    }

    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.reference_number = reference;
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive calendar-day range. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        DateRange::new(Some(date), Some(date))
    }

    /// The range as a half-open instant interval `[from, to)` in UTC.
    pub fn instants(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc();
        (
            self.start.map(midnight),
            self.end.map(|d| midnight(d) + Duration::days(1)),
        )
    }
}

// =============================================================================
// Audit
// =============================================================================

/// An entry whose `balance_before` doesn't match its predecessor's
/// `balance_after` (or zero, for the first entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    pub seq: i64,
    pub expected_before: Money,
    pub actual_before: Money,
}

/// Result of replaying a customer's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub customer_id: String,
    pub strategy: BalanceStrategy,
    pub entry_count: usize,
    /// Sum of every entry amount.
    pub replayed_balance: Money,
    /// The balance of record: the cached field, or the last entry's
    /// `balance_after` for derived-sum customers.
    pub recorded_balance: Money,
    pub chain_breaks: Vec<ChainBreak>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.chain_breaks.is_empty() && self.replayed_balance == self.recorded_balance
    }
}

/// Replays entries in append order.
pub fn replay(entries: &[LedgerEntry]) -> (Money, Vec<ChainBreak>) {
    let mut running = Money::zero();
    let mut breaks = Vec::new();
    for entry in entries {
        if entry.balance_before != running {
            breaks.push(ChainBreak {
                seq: entry.seq,
                expected_before: running,
                actual_before: entry.balance_before,
            });
        }
        running = entry.balance_before + entry.amount;
    }
    let replayed = entries.iter().map(|e| e.amount).sum();
    (replayed, breaks)
}

// =============================================================================
// Engine
// =============================================================================

/// Applies balance deltas and answers balance questions.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    db: Database,
    strategies: BalanceSettings,
}

impl LedgerEngine {
    pub fn new(db: Database, strategies: BalanceSettings) -> Self {
        LedgerEngine { db, strategies }
    }

    pub fn strategy_for(&self, channel: Channel) -> BalanceStrategy {
        self.strategies.strategy_for(channel)
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    /// A customer's balance of record, read on the caller's connection.
    pub async fn balance_in(
        &self,
        conn: &mut SqliteConnection,
        customer: &Customer,
    ) -> DbResult<Money> {
        match self.strategy_for(customer.channel) {
            BalanceStrategy::CachedField => {
                let current = CustomerRepository::fetch(conn, &customer.id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(customer.id.clone()))?;
                Ok(current.balance)
            }
            BalanceStrategy::DerivedSum => LedgerRepository::sum_amount(conn, &customer.id).await,
        }
    }

    /// Applies `delta` to the customer's balance and appends the entry.
    ///
    /// The caller owns the transaction and must already hold the write lock
    /// (see `CustomerRepository::touch`).
    pub async fn apply_delta(
        &self,
        conn: &mut SqliteConnection,
        customer: &Customer,
        delta: LedgerDelta,
    ) -> DbResult<LedgerEntry> {
        let strategy = self.strategy_for(customer.channel);
        let balance_before = self.balance_in(conn, customer).await?;
        let balance_after = balance_before + delta.amount;

        if strategy == BalanceStrategy::CachedField {
            CustomerRepository::set_balance(conn, &customer.id, balance_after).await?;
        }

        let mut entry = LedgerEntry {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            customer_id: delta.customer_id,
            sale_id: delta.sale_id,
            kind: delta.kind,
            amount: delta.amount,
            silver_weight: delta.silver_weight,
            payment_mode: delta.payment_mode,
            reference_number: delta.reference_number,
            notes: delta.notes,
            balance_before,
            balance_after,
            created_by: delta.created_by,
            transaction_date: Utc::now(),
        };
        entry.seq = LedgerRepository::insert(conn, &entry).await?;

        debug!(
            customer_id = %entry.customer_id,
            kind = %entry.kind,
            before = %balance_before,
            after = %balance_after,
            strategy = strategy.as_str(),
            "Delta applied"
        );
        Ok(entry)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A customer's balance of record.
    pub async fn balance_of(&self, customer_id: &str) -> DbResult<Money> {
        let mut conn = self.db.pool().acquire().await?;
        let customer = CustomerRepository::fetch(&mut conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
        self.balance_in(&mut conn, &customer).await
    }

    /// A customer's entries in append order within `range`.
    pub async fn entries_for(
        &self,
        customer_id: &str,
        range: DateRange,
    ) -> DbResult<Vec<LedgerEntry>> {
        if self.db.customers().get_by_id(customer_id).await?.is_none() {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }
        let (from, to) = range.instants();
        self.db.ledger().entries_for(customer_id, from, to).await
    }

    /// Replays a customer's whole ledger and compares it with the balance
    /// of record.
    pub async fn audit(&self, customer_id: &str) -> DbResult<LedgerAudit> {
        let mut conn = self.db.pool().acquire().await?;
        let customer = CustomerRepository::fetch(&mut conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let entries =
            LedgerRepository::fetch_for_customer(&mut conn, customer_id, None, None).await?;
        let (replayed_balance, chain_breaks) = replay(&entries);

        let strategy = self.strategy_for(customer.channel);
        let recorded_balance = match strategy {
            BalanceStrategy::CachedField => customer.balance,
            BalanceStrategy::DerivedSum => entries
                .last()
                .map(|e| e.balance_after)
                .unwrap_or_else(Money::zero),
        };

        let audit = LedgerAudit {
            customer_id: customer.id,
            strategy,
            entry_count: entries.len(),
            replayed_balance,
            recorded_balance,
            chain_breaks,
        };

        if audit.is_consistent() {
            debug!(customer_id, entries = audit.entry_count, "Ledger audit passed");
        } else {
            warn!(
                customer_id,
                replayed = %audit.replayed_balance,
                recorded = %audit.recorded_balance,
                breaks = audit.chain_breaks.len(),
                "Ledger audit found inconsistencies"
            );
        }
        Ok(audit)
    }

    // =========================================================================
    // Adjustments
    // =========================================================================

    /// Appends a manual adjustment not linked to any sale (opening balance,
    /// correction). Positive amounts increase what the customer owes.
    pub async fn record_adjustment(
        &self,
        customer_id: &str,
        amount: Money,
        notes: Option<&str>,
        created_by: &str,
    ) -> DbResult<LedgerEntry> {
        argent_core::validation::validate_actor(created_by)?;
        let notes = argent_core::validation::validate_notes(notes)?;
        if amount.is_zero() {
            return Err(CoreError::invalid_amount("adjustment amount must not be zero").into());
        }

        let mut tx = self.db.begin().await?;
        if !CustomerRepository::touch(&mut tx, customer_id).await? {
            return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
        }
        let customer = CustomerRepository::fetch(&mut tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let delta =
            LedgerDelta::new(customer_id, EntryKind::Adjustment, amount, created_by).notes(notes);
        let entry = self.apply_delta(&mut tx, &customer, delta).await?;
        tx.commit().await?;

        info!(
            customer_id,
            amount = %amount,
            balance = %entry.balance_after,
            "Adjustment recorded"
        );
        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{customer, engine};

    fn delta(c: &Customer, kind: EntryKind, rupees: i64) -> LedgerDelta {
        LedgerDelta::new(&c.id, kind, Money::from_rupees(rupees), "tester")
    }

    #[tokio::test]
    async fn test_cached_field_writes_customer_balance() {
        let (db, ledger) = engine().await;
        let c = customer(&db, Channel::Wholesale).await;

        let mut tx = db.begin().await.unwrap();
        assert!(CustomerRepository::touch(&mut tx, &c.id).await.unwrap());
        let first = ledger
            .apply_delta(&mut tx, &c, delta(&c, EntryKind::Sale, 100))
            .await
            .unwrap();
        let second = ledger
            .apply_delta(&mut tx, &c, delta(&c, EntryKind::Payment, -30))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.balance_after, second.balance_before);
        assert_eq!(second.balance_after, Money::from_rupees(70));

        let stored = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::from_rupees(70));
        assert_eq!(ledger.balance_of(&c.id).await.unwrap(), Money::from_rupees(70));
    }

    #[tokio::test]
    async fn test_derived_sum_leaves_field_alone() {
        let (db, ledger) = engine().await;
        let c = customer(&db, Channel::Regular).await;

        let mut tx = db.begin().await.unwrap();
        ledger
            .apply_delta(&mut tx, &c, delta(&c, EntryKind::Sale, 100))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let stored = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, Money::zero());
        assert_eq!(ledger.balance_of(&c.id).await.unwrap(), Money::from_rupees(100));
    }

    #[tokio::test]
    async fn test_rolled_back_delta_leaves_nothing() {
        let (db, ledger) = engine().await;
        let c = customer(&db, Channel::Wholesale).await;

        {
            let mut tx = db.begin().await.unwrap();
            ledger
                .apply_delta(&mut tx, &c, delta(&c, EntryKind::Sale, 100))
                .await
                .unwrap();
        }

        assert_eq!(ledger.balance_of(&c.id).await.unwrap(), Money::zero());
        assert!(!db.ledger().has_entries(&c.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_adjustment_and_audit() {
        let (db, ledger) = engine().await;
        let c = customer(&db, Channel::Wholesale).await;

        ledger
            .record_adjustment(&c.id, Money::from_rupees(250), Some("Opening balance"), "tester")
            .await
            .unwrap();
        ledger
            .record_adjustment(&c.id, Money::from_rupees(-50), None, "tester")
            .await
            .unwrap();

        let audit = ledger.audit(&c.id).await.unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.entry_count, 2);
        assert_eq!(audit.replayed_balance, Money::from_rupees(200));
        assert_eq!(audit.recorded_balance, Money::from_rupees(200));
    }

    #[tokio::test]
    async fn test_adjustment_rejects_zero_and_unknown_customer() {
        let (db, ledger) = engine().await;
        let c = customer(&db, Channel::Regular).await;

        let zero = ledger.record_adjustment(&c.id, Money::zero(), None, "tester").await;
        assert!(matches!(
            zero.unwrap_err().as_core(),
            Some(CoreError::InvalidAmount { .. })
        ));

        let missing = ledger
            .record_adjustment("missing", Money::from_rupees(1), None, "tester")
            .await;
        assert!(matches!(
            missing.unwrap_err().as_core(),
            Some(CoreError::CustomerNotFound(_))
        ));
    }

    #[test]
    fn test_replay_finds_breaks() {
        let entry = |seq: i64, before: i64, amount: i64| LedgerEntry {
            seq,
            id: seq.to_string(),
            customer_id: "c".to_string(),
            sale_id: None,
            kind: EntryKind::Adjustment,
            amount: Money::from_paise(amount),
            silver_weight: Weight::zero(),
            payment_mode: None,
            reference_number: None,
            notes: None,
            balance_before: Money::from_paise(before),
            balance_after: Money::from_paise(before + amount),
            created_by: "tester".to_string(),
            transaction_date: Utc::now(),
        };

        let (sum, breaks) = replay(&[entry(1, 0, 100), entry(2, 100, -40), entry(3, 60, 5)]);
        assert_eq!(sum, Money::from_paise(65));
        assert!(breaks.is_empty());

        let (_, breaks) = replay(&[entry(1, 0, 100), entry(2, 90, -40)]);
        assert_eq!(
            breaks,
            vec![ChainBreak {
                seq: 2,
                expected_before: Money::from_paise(100),
                actual_before: Money::from_paise(90),
            }]
        );
    }

    #[test]
    fn test_date_range_instants() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let (from, to) = DateRange::day(d).instants();
        assert_eq!(from.unwrap().to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert_eq!(to.unwrap().to_rfc3339(), "2024-03-06T00:00:00+00:00");
        assert_eq!(DateRange::default().instants(), (None, None));
    }
}
