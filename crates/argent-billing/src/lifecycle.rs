//! # Sale Lifecycle
//!
//! Every operation that moves money on a sale, each one a single database
//! transaction spanning the sale, its items, the ledger and the customer.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input (no writes)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN → touch customer/sale row   ← takes the write lock first        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read state → business checks → allocate voucher                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  write sale → LedgerEngine::apply_delta (customer + entry)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT            any `?` before this drops the tx → ROLLBACK         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status
//! `derive_status` runs after every money movement; `cancelled` is only
//! ever set by [`SaleLifecycle::cancel_sale`] and is terminal.

use argent_core::invoice::{calculate_invoice, parse_items};
use argent_core::status::{
    ensure_open, opening_silver_return, open_settlement, settle_payment, settle_silver_return,
};
use argent_core::validation::{
    validate_actor, validate_non_negative_money, validate_non_negative_weight, validate_notes,
};
use argent_core::{
    Channel, CoreError, Customer, EntryKind, ItemInput, LedgerEntry, Money, PaymentMode, Sale,
    SaleItem, TaxConfig, Weight,
};
use argent_db::{
    CustomerRepository, Database, DbResult, LedgerRepository, PaymentUpdate, RateRepository,
    SaleFilter, SaleRepository, MAX_PAGE_SIZE,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{TaxSettings, VoucherSettings};
use crate::ledger::{LedgerDelta, LedgerEngine};
use crate::voucher::{DailySequenceAllocator, VoucherAllocator};

// =============================================================================
// Requests
// =============================================================================

/// Which tax a new sale carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxChoice {
    /// No tax.
    #[default]
    None,
    /// GST at the configured default rates.
    DefaultGst,
    /// Caller-supplied rates.
    Custom(TaxConfig),
}

/// Everything needed to bill a new sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub customer_id: String,
    /// Must match the customer's channel.
    pub channel: Channel,
    pub items: Vec<ItemInput>,
    /// Rate per gram to price the sale at. Falls back to the active rate on
    /// the sale date.
    #[serde(default)]
    pub silver_rate: Option<Money>,
    /// Cash paid up front.
    #[serde(default)]
    pub paid_amount: Money,
    /// Silver paid in kind up front.
    #[serde(default)]
    pub paid_silver: Weight,
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
    /// Cheque, UPI or card reference of the up-front payment.
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub tax: TaxChoice,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: String,
}

impl CreateSaleRequest {
    pub fn new(
        customer_id: &str,
        channel: Channel,
        items: Vec<ItemInput>,
        created_by: &str,
    ) -> Self {
        CreateSaleRequest {
            customer_id: customer_id.to_string(),
            channel,
            items,
            silver_rate: None,
            paid_amount: Money::zero(),
            paid_silver: Weight::zero(),
            payment_mode: None,
            reference_number: None,
            tax: TaxChoice::None,
            sale_date: None,
            notes: None,
            created_by: created_by.to_string(),
        }
    }
}

/// A cash (or card, UPI, ...) payment against a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    #[serde(default)]
    pub mode: PaymentMode,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: String,
}

impl PaymentRequest {
    pub fn cash(amount: Money, created_by: &str) -> Self {
        PaymentRequest {
            amount,
            mode: PaymentMode::Cash,
            reference_number: None,
            notes: None,
            created_by: created_by.to_string(),
        }
    }
}

/// Silver handed over as payment, valued at `rate` per gram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilverPaymentRequest {
    pub weight: Weight,
    /// Defaults to the rate active today.
    #[serde(default)]
    pub rate: Option<Money>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: String,
}

/// Silver given back to a wholesale customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilverReturnRequest {
    pub weight: Weight,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: String,
}

// =============================================================================
// Results
// =============================================================================

/// A newly billed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// The `sale` entry, then the `payment` entry if anything was paid.
    pub entries: Vec<LedgerEntry>,
}

/// A sale after one more operation, with the entry it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub entry: LedgerEntry,
}

/// A sale with everything attached to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDetails {
    pub sale: Sale,
    pub customer: Customer,
    pub items: Vec<SaleItem>,
    pub entries: Vec<LedgerEntry>,
}

/// One page of a sale listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalePage {
    pub sales: Vec<Sale>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Runs the money-moving operations on sales.
#[derive(Debug, Clone)]
pub struct SaleLifecycle<A: VoucherAllocator = DailySequenceAllocator> {
    db: Database,
    ledger: LedgerEngine,
    vouchers: VoucherSettings,
    tax: TaxSettings,
    allocator: A,
}

impl SaleLifecycle<DailySequenceAllocator> {
    pub fn new(
        db: Database,
        ledger: LedgerEngine,
        vouchers: VoucherSettings,
        tax: TaxSettings,
    ) -> Self {
        SaleLifecycle::with_allocator(db, ledger, vouchers, tax, DailySequenceAllocator)
    }
}

impl<A: VoucherAllocator> SaleLifecycle<A> {
    pub fn with_allocator(
        db: Database,
        ledger: LedgerEngine,
        vouchers: VoucherSettings,
        tax: TaxSettings,
        allocator: A,
    ) -> Self {
        SaleLifecycle {
            db,
            ledger,
            vouchers,
            tax,
            allocator,
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Bills a new sale.
    ///
    /// ## Ledger Effect
    /// ```text
    /// sale     +total            balance: previous → previous + total
    /// payment  -effective_paid   (only when something was paid up front)
    /// ─────────────────────────
    /// closing = previous + (total - effective_paid)
    /// ```
    pub async fn create_sale(&self, request: CreateSaleRequest) -> DbResult<CreatedSale> {
        rejected("create_sale", self.create_sale_inner(request).await)
    }

    async fn create_sale_inner(&self, request: CreateSaleRequest) -> DbResult<CreatedSale> {
        validate_actor(&request.created_by)?;
        validate_non_negative_money("paid_amount", request.paid_amount)?;
        validate_non_negative_weight("paid_silver", request.paid_silver)?;
        let notes = validate_notes(request.notes.as_deref())?;
        if let Some(rate) = request.silver_rate {
            if !rate.is_positive() {
                return Err(CoreError::non_positive("silver_rate", rate).into());
            }
        }
        let measurements = parse_items(request.items)?;
        let tax = match request.tax {
            TaxChoice::None => TaxConfig::none(),
            TaxChoice::DefaultGst => self.tax.gst(),
            TaxChoice::Custom(tax) => tax,
        };
        let sale_date = request.sale_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = self.db.begin().await?;
        let customer = lock_customer(&mut tx, &request.customer_id).await?;
        if customer.channel != request.channel {
            return Err(CoreError::CustomerNotFound(request.customer_id).into());
        }

        let silver_rate = match request.silver_rate {
            Some(rate) => rate,
            None => RateRepository::fetch_as_of(&mut tx, sale_date)
                .await?
                .map(|r| r.rate_per_gram)
                .ok_or_else(|| CoreError::RateNotFound(sale_date.to_string()))?,
        };

        let invoice = calculate_invoice(measurements, silver_rate, tax)?;
        let settlement = open_settlement(
            invoice.total_amount,
            request.paid_amount,
            request.paid_silver,
            silver_rate,
        );
        let previous_balance = self.ledger.balance_in(&mut tx, &customer).await?;
        let closing_balance = previous_balance + settlement.obligation;

        let prefix = self.vouchers.prefix_for(customer.channel);
        let voucher_number = self.allocator.allocate(&mut tx, prefix, sale_date).await?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();
        let (silver_to_return, silver_return_status) =
            opening_silver_return(customer.channel, invoice.total_silver_weight);

        let sale = Sale {
            id: sale_id.clone(),
            voucher_number,
            customer_id: customer.id.clone(),
            channel: customer.channel,
            sale_date,
            silver_rate,
            total_net_weight: invoice.total_net_weight,
            total_wastage: invoice.total_wastage,
            total_silver_weight: invoice.total_silver_weight,
            total_labor_charges: invoice.total_labor_charges,
            subtotal: invoice.subtotal,
            tax_applicable: invoice.tax.applicable,
            cgst_rate: invoice.tax.cgst,
            sgst_rate: invoice.tax.sgst,
            cgst: invoice.cgst,
            sgst: invoice.sgst,
            total_amount: invoice.total_amount,
            paid_amount: settlement.effective_paid,
            paid_silver: request.paid_silver,
            balance_amount: settlement.balance_amount,
            previous_balance,
            closing_balance,
            status: settlement.status,
            silver_to_return,
            silver_returned: Weight::zero(),
            silver_return_status,
            notes,
            created_by: request.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<SaleItem> = invoice
            .lines
            .into_iter()
            .enumerate()
            .map(|(position, line)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                position: position as i64,
                product_id: line.item.product_id,
                description: line.item.description,
                pieces: line.item.pieces,
                gross_weight: line.item.gross_weight,
                stone_weight: line.item.stone_weight,
                net_weight: line.item.net_weight,
                wastage: line.item.wastage,
                touch: line.item.touch,
                labor_rate_per_kg: line.item.labor_rate_per_kg,
                silver_weight: line.silver_weight,
                labor_charges: line.labor_charges,
                item_amount: line.item_amount,
                created_at: now,
            })
            .collect();

        SaleRepository::insert(&mut tx, &sale).await?;
        SaleRepository::insert_items(&mut tx, &items).await?;

        let mut entries = Vec::with_capacity(2);
        let charge = LedgerDelta::new(
            &customer.id,
            EntryKind::Sale,
            sale.total_amount,
            &request.created_by,
        )
        .for_sale(&sale.id)
        .notes(Some(format!("Sale {}", sale.voucher_number)));
        entries.push(self.ledger.apply_delta(&mut tx, &customer, charge).await?);

        if settlement.effective_paid.is_positive() {
            let mode = request.payment_mode.unwrap_or(if request.paid_amount.is_zero() {
                PaymentMode::Silver
            } else {
                PaymentMode::Cash
            });
            let note = match customer.channel {
                Channel::Wholesale => Some(format!(
                    "Paid: {} + {}g silver ({})",
                    request.paid_amount, request.paid_silver, settlement.paid_silver_value
                )),
                Channel::Regular => None,
            };
            let payment = LedgerDelta::new(
                &customer.id,
                EntryKind::Payment,
                -settlement.effective_paid,
                &request.created_by,
            )
            .for_sale(&sale.id)
            .silver(request.paid_silver)
            .mode(mode)
            .reference(request.reference_number.filter(|r| !r.trim().is_empty()))
            .notes(note);
            entries.push(self.ledger.apply_delta(&mut tx, &customer, payment).await?);
        }

        let recorded = entries
            .last()
            .map(|e| e.balance_after)
            .unwrap_or(previous_balance);
        if recorded != closing_balance {
            return Err(CoreError::Calculation(format!(
                "closing balance {} does not match ledger balance {}",
                closing_balance, recorded
            ))
            .into());
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            voucher_number = %sale.voucher_number,
            customer_id = %sale.customer_id,
            channel = %sale.channel,
            total = %sale.total_amount,
            status = %sale.status,
            "Sale created"
        );
        Ok(CreatedSale { sale, items, entries })
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Records a payment against a sale.
    pub async fn add_payment(
        &self,
        sale_id: &str,
        request: PaymentRequest,
    ) -> DbResult<SaleReceipt> {
        rejected("add_payment", self.add_payment_inner(sale_id, request).await)
    }

    async fn add_payment_inner(
        &self,
        sale_id: &str,
        request: PaymentRequest,
    ) -> DbResult<SaleReceipt> {
        validate_actor(&request.created_by)?;
        let notes = validate_notes(request.notes.as_deref())?;
        if !request.amount.is_positive() {
            return Err(CoreError::non_positive("payment amount", request.amount).into());
        }

        let mut tx = self.db.begin().await?;
        let (sale, customer) = lock_sale(&mut tx, sale_id).await?;

        let delta = LedgerDelta::new(
            &customer.id,
            EntryKind::Payment,
            -request.amount,
            &request.created_by,
        )
        .for_sale(&sale.id)
        .mode(request.mode)
        .reference(request.reference_number.filter(|r| !r.trim().is_empty()))
        .notes(notes);
        let entry = self.ledger.apply_delta(&mut tx, &customer, delta).await?;

        let settled = settle_payment(sale.paid_amount, sale.balance_amount, request.amount);
        let update = PaymentUpdate {
            paid_amount: settled.paid_amount,
            paid_silver: sale.paid_silver,
            balance_amount: settled.balance_amount,
            closing_balance: entry.balance_after,
            status: settled.status,
        };
        let sale = finish_payment(&mut tx, &sale.id, &update).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            amount = %request.amount,
            mode = ?request.mode,
            balance = %sale.balance_amount,
            status = %sale.status,
            "Payment recorded"
        );
        Ok(SaleReceipt { sale, entry })
    }

    /// Records silver handed over as payment. Counts exactly like a cash
    /// payment of its value; the weight is tracked separately.
    pub async fn add_silver_payment(
        &self,
        sale_id: &str,
        request: SilverPaymentRequest,
    ) -> DbResult<SaleReceipt> {
        rejected(
            "add_silver_payment",
            self.add_silver_payment_inner(sale_id, request).await,
        )
    }

    async fn add_silver_payment_inner(
        &self,
        sale_id: &str,
        request: SilverPaymentRequest,
    ) -> DbResult<SaleReceipt> {
        validate_actor(&request.created_by)?;
        let notes = validate_notes(request.notes.as_deref())?;
        if !request.weight.is_positive() {
            return Err(CoreError::invalid_amount(format!(
                "silver payment weight must be greater than zero, got {} g",
                request.weight
            ))
            .into());
        }
        if let Some(rate) = request.rate {
            if !rate.is_positive() {
                return Err(CoreError::non_positive("silver rate", rate).into());
            }
        }

        let mut tx = self.db.begin().await?;
        let (sale, customer) = lock_sale(&mut tx, sale_id).await?;

        let rate = match request.rate {
            Some(rate) => rate,
            None => {
                let today = Utc::now().date_naive();
                RateRepository::fetch_as_of(&mut tx, today)
                    .await?
                    .map(|r| r.rate_per_gram)
                    .ok_or_else(|| CoreError::RateNotFound(today.to_string()))?
            }
        };
        let value = rate.for_weight(request.weight);
        if !value.is_positive() {
            return Err(CoreError::non_positive("silver payment value", value).into());
        }

        let notes =
            notes.unwrap_or_else(|| format!("Silver payment: {}g @ {}/g", request.weight, rate));
        let delta = LedgerDelta::new(
            &customer.id,
            EntryKind::SilverPayment,
            -value,
            &request.created_by,
        )
        .for_sale(&sale.id)
        .silver(request.weight)
        .mode(PaymentMode::Silver)
        .notes(Some(notes));
        let entry = self.ledger.apply_delta(&mut tx, &customer, delta).await?;

        let settled = settle_payment(sale.paid_amount, sale.balance_amount, value);
        let update = PaymentUpdate {
            paid_amount: settled.paid_amount,
            paid_silver: sale.paid_silver + request.weight,
            balance_amount: settled.balance_amount,
            closing_balance: entry.balance_after,
            status: settled.status,
        };
        let sale = finish_payment(&mut tx, &sale.id, &update).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            weight = %request.weight,
            rate = %rate,
            value = %value,
            status = %sale.status,
            "Silver payment recorded"
        );
        Ok(SaleReceipt { sale, entry })
    }

    // =========================================================================
    // Silver Return
    // =========================================================================

    /// Records silver given back on a wholesale sale. The cash balance does
    /// not move; the entry carries only the weight.
    pub async fn add_silver_return(
        &self,
        sale_id: &str,
        request: SilverReturnRequest,
    ) -> DbResult<SaleReceipt> {
        rejected(
            "add_silver_return",
            self.add_silver_return_inner(sale_id, request).await,
        )
    }

    async fn add_silver_return_inner(
        &self,
        sale_id: &str,
        request: SilverReturnRequest,
    ) -> DbResult<SaleReceipt> {
        validate_actor(&request.created_by)?;
        let notes = validate_notes(request.notes.as_deref())?;

        let mut tx = self.db.begin().await?;
        let (sale, customer) = lock_sale(&mut tx, sale_id).await?;
        if !sale.channel.tracks_silver_return() {
            return Err(CoreError::InvalidChannel {
                operation: "Silver return",
                channel: sale.channel,
            }
            .into());
        }

        let (returned, status) =
            settle_silver_return(sale.silver_to_return, sale.silver_returned, request.weight)?;

        let delta = LedgerDelta::new(
            &customer.id,
            EntryKind::SilverReturn,
            Money::zero(),
            &request.created_by,
        )
        .for_sale(&sale.id)
        .silver(request.weight)
        .mode(PaymentMode::Silver)
        .notes(notes);
        let entry = self.ledger.apply_delta(&mut tx, &customer, delta).await?;

        SaleRepository::update_silver_return(&mut tx, &sale.id, returned, status).await?;
        let sale = SaleRepository::fetch(&mut tx, &sale.id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            weight = %request.weight,
            returned = %sale.silver_returned,
            remaining = %sale.silver_remaining(),
            "Silver return recorded"
        );
        Ok(SaleReceipt { sale, entry })
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    /// Cancels a sale by appending a reversal of its total. Payments already
    /// made stay on the ledger and leave the customer in credit.
    pub async fn cancel_sale(
        &self,
        sale_id: &str,
        reason: Option<&str>,
        created_by: &str,
    ) -> DbResult<SaleReceipt> {
        rejected(
            "cancel_sale",
            self.cancel_sale_inner(sale_id, reason, created_by).await,
        )
    }

    async fn cancel_sale_inner(
        &self,
        sale_id: &str,
        reason: Option<&str>,
        created_by: &str,
    ) -> DbResult<SaleReceipt> {
        validate_actor(created_by)?;
        let reason = validate_notes(reason)?;

        let mut tx = self.db.begin().await?;
        let (sale, customer) = lock_sale(&mut tx, sale_id).await?;

        let note = match reason {
            Some(reason) => format!("Cancelled {}: {}", sale.voucher_number, reason),
            None => format!("Cancelled {}", sale.voucher_number),
        };
        let delta = LedgerDelta::new(
            &customer.id,
            EntryKind::Adjustment,
            -sale.total_amount,
            created_by,
        )
        .for_sale(&sale.id)
        .notes(Some(note));
        let entry = self.ledger.apply_delta(&mut tx, &customer, delta).await?;

        SaleRepository::cancel(&mut tx, &sale.id, entry.balance_after).await?;
        let sale = SaleRepository::fetch(&mut tx, &sale.id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            voucher_number = %sale.voucher_number,
            reversed = %sale.total_amount,
            "Sale cancelled"
        );
        Ok(SaleReceipt { sale, entry })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// A sale with its customer, items and ledger entries.
    pub async fn sale_details(&self, sale_id: &str) -> DbResult<SaleDetails> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let customer = self
            .db
            .customers()
            .get_by_id(&sale.customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(sale.customer_id.clone()))?;
        let items = sales.get_items(&sale.id).await?;
        let entries = self.db.ledger().entries_for_sale(&sale.id).await?;

        Ok(SaleDetails {
            sale,
            customer,
            items,
            entries,
        })
    }

    /// A sale by voucher number.
    pub async fn find_by_voucher(&self, voucher_number: &str) -> DbResult<Sale> {
        self.db
            .sales()
            .get_by_voucher(voucher_number)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(voucher_number.to_string()).into())
    }

    /// Sales matching `filter`, newest first.
    pub async fn list_sales(&self, filter: &SaleFilter) -> DbResult<SalePage> {
        let (sales, total) = self.db.sales().list(filter).await?;
        Ok(SalePage {
            sales,
            total,
            page: filter.page.max(1),
            limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Takes the write lock on a customer and reads them.
async fn lock_customer(conn: &mut SqliteConnection, customer_id: &str) -> DbResult<Customer> {
    if !CustomerRepository::touch(conn, customer_id).await? {
        return Err(CoreError::CustomerNotFound(customer_id.to_string()).into());
    }
    CustomerRepository::fetch(conn, customer_id)
        .await?
        .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()).into())
}

/// Takes the write lock on a sale, reads it and its customer, and refuses
/// cancelled sales.
async fn lock_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<(Sale, Customer)> {
    if !SaleRepository::touch(conn, sale_id).await? {
        return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
    }
    let sale = SaleRepository::fetch(conn, sale_id)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
    ensure_open(&sale.id, sale.status)?;

    let customer = CustomerRepository::fetch(conn, &sale.customer_id)
        .await?
        .ok_or_else(|| CoreError::CustomerNotFound(sale.customer_id.clone()))?;
    Ok((sale, customer))
}

async fn finish_payment(
    conn: &mut SqliteConnection,
    sale_id: &str,
    update: &PaymentUpdate,
) -> DbResult<Sale> {
    SaleRepository::update_payment(conn, sale_id, update).await?;
    let sale = SaleRepository::fetch(conn, sale_id)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

    let last = LedgerRepository::last_entry(conn, &sale.customer_id).await?;
    if last.map(|e| e.balance_after) != Some(sale.closing_balance) {
        return Err(CoreError::Calculation(format!(
            "sale {} closing balance drifted from the ledger",
            sale.voucher_number
        ))
        .into());
    }
    Ok(sale)
}

fn rejected<T>(operation: &'static str, result: DbResult<T>) -> DbResult<T> {
    if let Err(err) = &result {
        warn!(operation, code = %err.kind(), error = %err, "Operation rejected");
    }
    result
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{lifecycle, regular_customer, scenario_a_item, wholesale_customer};
    use argent_core::{ErrorKind, SaleStatus};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn scenario_b(customer_id: &str, channel: Channel) -> CreateSaleRequest {
        let mut request =
            CreateSaleRequest::new(customer_id, channel, vec![scenario_a_item()], "tester");
        request.silver_rate = Some(Money::from_rupees(75));
        request.paid_amount = Money::from_rupees(3000);
        request.paid_silver = Weight::from_grams(10);
        request.sale_date = Some(day());
        request
    }

    #[tokio::test]
    async fn test_create_sale_with_up_front_payment() {
        let (db, sales) = lifecycle().await;
        let c = wholesale_customer(&db).await;

        let created = sales.create_sale(scenario_b(&c.id, Channel::Wholesale)).await.unwrap();
        let sale = &created.sale;

        assert_eq!(sale.voucher_number, "202403050001");
        assert_eq!(sale.total_amount, Money::from_paise(589_250));
        assert_eq!(sale.paid_amount, Money::from_rupees(3750));
        assert_eq!(sale.balance_amount, Money::from_paise(214_250));
        assert_eq!(sale.status, SaleStatus::Partial);
        assert_eq!(sale.silver_to_return, Weight::from_milligrams(77_900));
        assert_eq!(sale.closing_balance, Money::from_paise(214_250));

        assert_eq!(created.entries.len(), 2);
        assert_eq!(created.entries[0].kind, EntryKind::Sale);
        assert_eq!(created.entries[1].amount, Money::from_rupees(-3750));
        assert_eq!(
            created.entries[1].notes.as_deref(),
            Some("Paid: ₹3000.00 + 10.000g silver (₹750.00)")
        );
        assert_eq!(created.items.len(), 1);
        assert_eq!(created.entries[1].reference_number, None);
    }

    #[tokio::test]
    async fn test_up_front_payment_keeps_reference() {
        let (db, sales) = lifecycle().await;
        let c = regular_customer(&db).await;

        let mut request = scenario_b(&c.id, Channel::Regular);
        request.payment_mode = Some(PaymentMode::Upi);
        request.reference_number = Some("UPI-448812".to_string());
        let created = sales.create_sale(request).await.unwrap();

        let payment = &created.entries[1];
        assert_eq!(payment.kind, EntryKind::Payment);
        assert_eq!(payment.payment_mode, Some(PaymentMode::Upi));
        assert_eq!(payment.reference_number.as_deref(), Some("UPI-448812"));
        assert_eq!(created.entries[0].reference_number, None);

        let mut blank = scenario_b(&c.id, Channel::Regular);
        blank.reference_number = Some("  ".to_string());
        let created = sales.create_sale(blank).await.unwrap();
        assert_eq!(created.entries[1].reference_number, None);
    }

    #[tokio::test]
    async fn test_payment_settles_sale() {
        let (db, sales) = lifecycle().await;
        let c = regular_customer(&db).await;
        let created = sales.create_sale(scenario_b(&c.id, Channel::Regular)).await.unwrap();
        assert!(created.sale.voucher_number.starts_with("REG"));

        let receipt = sales
            .add_payment(
                &created.sale.id,
                PaymentRequest::cash(Money::from_paise(214_250), "tester"),
            )
            .await
            .unwrap();
        assert_eq!(receipt.sale.balance_amount, Money::zero());
        assert_eq!(receipt.sale.status, SaleStatus::Paid);
        assert_eq!(receipt.sale.closing_balance, Money::zero());
        assert_eq!(receipt.entry.balance_after, Money::zero());
    }

    #[tokio::test]
    async fn test_payment_rejects_non_positive_amount() {
        let (db, sales) = lifecycle().await;
        let c = regular_customer(&db).await;
        let created = sales.create_sale(scenario_b(&c.id, Channel::Regular)).await.unwrap();

        let err = sales
            .add_payment(&created.sale.id, PaymentRequest::cash(Money::zero(), "tester"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err = sales
            .add_payment("missing", PaymentRequest::cash(Money::from_rupees(1), "tester"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_silver_payment_tracks_weight() {
        let (db, sales) = lifecycle().await;
        let c = wholesale_customer(&db).await;
        let created = sales.create_sale(scenario_b(&c.id, Channel::Wholesale)).await.unwrap();

        let receipt = sales
            .add_silver_payment(
                &created.sale.id,
                SilverPaymentRequest {
                    weight: Weight::from_grams(20),
                    rate: Some(Money::from_rupees(80)),
                    notes: None,
                    created_by: "tester".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.entry.kind, EntryKind::SilverPayment);
        assert_eq!(receipt.entry.amount, Money::from_rupees(-1600));
        assert_eq!(receipt.entry.silver_weight, Weight::from_grams(20));
        assert_eq!(receipt.entry.notes.as_deref(), Some("Silver payment: 20.000g @ ₹80.00/g"));
        assert_eq!(receipt.sale.paid_silver, Weight::from_grams(30));
        assert_eq!(receipt.sale.paid_amount, Money::from_rupees(5350));
        assert_eq!(receipt.sale.balance_amount, Money::from_paise(54_250));
    }

    #[tokio::test]
    async fn test_silver_return_only_for_wholesale() {
        let (db, sales) = lifecycle().await;
        let c = regular_customer(&db).await;
        let created = sales.create_sale(scenario_b(&c.id, Channel::Regular)).await.unwrap();

        let err = sales
            .add_silver_return(
                &created.sale.id,
                SilverReturnRequest {
                    weight: Weight::from_grams(1),
                    notes: None,
                    created_by: "tester".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChannel);
    }

    #[tokio::test]
    async fn test_channel_mismatch_and_missing_rate() {
        let (db, sales) = lifecycle().await;
        let c = regular_customer(&db).await;

        let err = sales
            .create_sale(scenario_b(&c.id, Channel::Wholesale))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut request = scenario_b(&c.id, Channel::Regular);
        request.silver_rate = None;
        let err = sales.create_sale(request).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::RateNotFound(_))));
        assert!(!db.ledger().has_entries(&c.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_reverses_total() {
        let (db, sales) = lifecycle().await;
        let c = wholesale_customer(&db).await;
        let created = sales.create_sale(scenario_b(&c.id, Channel::Wholesale)).await.unwrap();

        let receipt = sales
            .cancel_sale(&created.sale.id, Some("wrong customer"), "tester")
            .await
            .unwrap();
        assert_eq!(receipt.sale.status, SaleStatus::Cancelled);
        assert_eq!(receipt.sale.balance_amount, Money::zero());
        assert_eq!(receipt.entry.kind, EntryKind::Adjustment);
        // The up-front payment remains as credit
        assert_eq!(receipt.entry.balance_after, Money::from_rupees(-3750));

        let err = sales
            .add_payment(&created.sale.id, PaymentRequest::cash(Money::from_rupees(1), "tester"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatus);

        let details = sales.sale_details(&created.sale.id).await.unwrap();
        assert_eq!(details.entries.len(), 3);
        assert_eq!(details.customer.id, c.id);
    }
}
