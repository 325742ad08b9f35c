//! # Reports
//!
//! Read-only summaries for the reporting and export collaborators. Nothing
//! here takes the write lock.

use argent_core::{BalanceStrategy, Channel, Money, Sale, Weight};
use argent_db::{Database, DbResult, ReceivedTotals, SaleFilter, SaleTotals, MAX_PAGE_SIZE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::BalanceSettings;
use crate::ledger::DateRange;

/// Billing totals for one channel. Cancelled sales are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingStats {
    pub channel: Channel,
    pub range: DateRange,
    pub total_sales: i64,
    pub total_amount: Money,
    pub total_silver_weight: Weight,
    pub total_labor_charges: Money,
    pub total_tax: Money,
    /// Cash plus silver-valued-as-cash paid against the sales in range.
    pub total_payments_received: Money,
    pub paid_silver: Weight,
    pub pending_silver_return: Weight,
    pub returned_silver: Weight,
    /// What customers of the channel owe right now, regardless of range.
    pub pending_balance: Money,
    pub active_customers: i64,
}

/// One calendar day on one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyAnalysis {
    pub channel: Channel,
    pub date: NaiveDate,
    /// Sales dated that day.
    pub sales_totals: SaleTotals,
    /// Payments and silver payments entered that day, against any sale.
    pub received: ReceivedTotals,
    pub sales: Vec<Sale>,
}

#[derive(Debug, Clone)]
pub struct Reports {
    db: Database,
    strategies: BalanceSettings,
}

impl Reports {
    pub fn new(db: Database, strategies: BalanceSettings) -> Self {
        Reports { db, strategies }
    }

    pub async fn billing_stats(
        &self,
        channel: Channel,
        range: DateRange,
    ) -> DbResult<BillingStats> {
        let filter = SaleFilter::for_channel(channel).between(range.start, range.end);
        let totals = self.db.sales().totals(&filter).await?;
        let pending_balance = self.pending_balance(channel).await?;
        let active_customers = self.db.customers().count_active(Some(channel)).await?;

        Ok(BillingStats {
            channel,
            range,
            total_sales: totals.sale_count,
            total_amount: totals.total_amount,
            total_silver_weight: totals.total_silver_weight,
            total_labor_charges: totals.total_labor_charges,
            total_tax: totals.total_tax,
            total_payments_received: totals.paid_amount,
            paid_silver: totals.paid_silver,
            pending_silver_return: totals.pending_silver_return,
            returned_silver: totals.returned_silver,
            pending_balance,
            active_customers,
        })
    }

    pub async fn daily_analysis(
        &self,
        channel: Channel,
        date: NaiveDate,
    ) -> DbResult<DailyAnalysis> {
        let mut filter = SaleFilter::for_channel(channel).between(Some(date), Some(date));
        let sales_totals = self.db.sales().totals(&filter).await?;

        let (from, to) = DateRange::day(date).instants();
        let received = match (from, to) {
            (Some(from), Some(to)) => self.db.ledger().received_between(channel, from, to).await?,
            _ => ReceivedTotals::default(),
        };

        filter.limit = MAX_PAGE_SIZE;
        filter.page = 1;
        let mut sales = Vec::new();
        loop {
            let (page, total) = self.db.sales().list(&filter).await?;
            let fetched = page.len();
            sales.extend(page);
            if fetched == 0 || sales.len() as i64 >= total {
                break;
            }
            filter.page += 1;
        }

        Ok(DailyAnalysis {
            channel,
            date,
            sales_totals,
            received,
            sales,
        })
    }

    /// Sum of positive balances on the channel, read through its strategy.
    pub async fn pending_balance(&self, channel: Channel) -> DbResult<Money> {
        match self.strategies.strategy_for(channel) {
            BalanceStrategy::CachedField => self.db.customers().outstanding_by_field(channel).await,
            BalanceStrategy::DerivedSum => self.db.ledger().outstanding_by_sum(channel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{CreateSaleRequest, PaymentRequest};
    use crate::testing::{billing, regular_customer, scenario_a_item, wholesale_customer};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn request(customer_id: &str, channel: Channel, date: NaiveDate) -> CreateSaleRequest {
        let mut request =
            CreateSaleRequest::new(customer_id, channel, vec![scenario_a_item()], "tester");
        request.silver_rate = Some(Money::from_rupees(75));
        request.sale_date = Some(date);
        request
    }

    #[tokio::test]
    async fn test_billing_stats_per_channel() {
        let billing = billing().await;
        let w = wholesale_customer(billing.database()).await;
        let r = regular_customer(billing.database()).await;

        let mut paid = request(&w.id, Channel::Wholesale, day(1));
        paid.paid_amount = Money::from_rupees(1000);
        billing.sales().create_sale(paid).await.unwrap();
        billing.sales().create_sale(request(&w.id, Channel::Wholesale, day(2))).await.unwrap();
        let cancelled = billing
            .sales()
            .create_sale(request(&w.id, Channel::Wholesale, day(2)))
            .await
            .unwrap();
        billing
            .sales()
            .cancel_sale(&cancelled.sale.id, None, "tester")
            .await
            .unwrap();
        billing.sales().create_sale(request(&r.id, Channel::Regular, day(2))).await.unwrap();

        let stats = billing
            .reports()
            .billing_stats(Channel::Wholesale, DateRange::default())
            .await
            .unwrap();
        assert_eq!(stats.total_sales, 2);
        assert_eq!(stats.total_amount, Money::from_paise(2 * 589_250));
        assert_eq!(stats.total_payments_received, Money::from_rupees(1000));
        assert_eq!(stats.pending_silver_return, Weight::from_milligrams(2 * 77_900));
        assert_eq!(stats.pending_balance, Money::from_paise(2 * 589_250 - 100_000));
        assert_eq!(stats.active_customers, 1);

        let regular = billing
            .reports()
            .billing_stats(Channel::Regular, DateRange::new(Some(day(2)), Some(day(2))))
            .await
            .unwrap();
        assert_eq!(regular.total_sales, 1);
        assert_eq!(regular.pending_balance, Money::from_paise(589_250));
        assert_eq!(regular.pending_silver_return, Weight::zero());
    }

    #[tokio::test]
    async fn test_daily_analysis_counts_payments_entered_today() {
        let billing = billing().await;
        let r = regular_customer(billing.database()).await;
        let today = chrono::Utc::now().date_naive();

        let created = billing
            .sales()
            .create_sale(request(&r.id, Channel::Regular, today))
            .await
            .unwrap();
        billing
            .sales()
            .add_payment(&created.sale.id, PaymentRequest::cash(Money::from_rupees(500), "tester"))
            .await
            .unwrap();

        let analysis = billing.reports().daily_analysis(Channel::Regular, today).await.unwrap();
        assert_eq!(analysis.sales.len(), 1);
        assert_eq!(analysis.sales_totals.sale_count, 1);
        assert_eq!(analysis.received.payment_count, 1);
        assert_eq!(analysis.received.cash, Money::from_rupees(500));

        let wholesale = billing.reports().daily_analysis(Channel::Wholesale, today).await.unwrap();
        assert!(wholesale.sales.is_empty());
        assert_eq!(wholesale.received.payment_count, 0);
    }
}
