//! # Domain Types
//!
//! Core domain types used throughout Argent.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │      Sale       │   │   LedgerEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  customer_id    │   │  seq (order)    │       │
//! │  │  phone          │   │  voucher_number │◄──│  sale_id?       │       │
//! │  │  balance        │   │  status         │   │  amount (±)     │       │
//! │  │  channel        │   │  balance_amount │   │  before / after │       │
//! │  └─────────────────┘   └───────┬─────────┘   └─────────────────┘       │
//! │                                │ owns                                   │
//! │  ┌─────────────────┐   ┌───────▼─────────┐   ┌─────────────────┐       │
//! │  │   SilverRate    │   │    SaleItem     │   │   SaleStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  rate_date      │   │  measurements   │   │  Pending        │       │
//! │  │  rate_per_gram  │   │  derived totals │   │  Partial, Paid  │       │
//! │  └─────────────────┘   └─────────────────┘   │  Cancelled      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists (`voucher_number`, wholesale `phone`)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::decimal;
use crate::money::Money;
use crate::weight::{Percentage, Weight};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 150 bps = 1.5% (CGST on silver articles)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Shows the rate as a percentage (`1.50%`).
impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", decimal::format_units(i64::from(self.0), 2))
    }
}

/// Parses a percentage with up to two decimals (`"1.5"` → 150 bps).
impl FromStr for TaxRate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ValidationError::InvalidFormat {
            field: "tax_rate".to_string(),
            reason,
        };
        let bps = decimal::parse_units(s, 2).map_err(|e| invalid(e.to_string()))?;
        u32::try_from(bps)
            .map(TaxRate)
            .map_err(|_| invalid(format!("'{}' is not a non-negative percentage", s.trim())))
    }
}

/// Tax settings applied to one invoice.
///
/// The engine applies whatever rates the caller passes; it never decides
/// whether a sale is taxable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxConfig {
    pub applicable: bool,
    pub cgst: TaxRate,
    pub sgst: TaxRate,
}

impl TaxConfig {
    /// No tax at all.
    pub const fn none() -> Self {
        TaxConfig {
            applicable: false,
            cgst: TaxRate::zero(),
            sgst: TaxRate::zero(),
        }
    }

    /// Tax applied at the given CGST and SGST rates.
    pub const fn gst(cgst: TaxRate, sgst: TaxRate) -> Self {
        TaxConfig {
            applicable: true,
            cgst,
            sgst,
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

/// The billing workflow a customer and their sales belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Simplified retail billing. Vouchers carry the `REG` prefix.
    Regular,
    /// Wholesale billing with silver-return tracking.
    Wholesale,
}

impl Channel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Channel::Regular => "regular",
            Channel::Wholesale => "wholesale",
        }
    }

    /// Whether sales on this channel owe silver back to the customer.
    pub const fn tracks_silver_return(&self) -> bool {
        matches!(self, Channel::Wholesale)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Channel::Regular),
            "wholesale" => Ok(Channel::Wholesale),
            _ => Err(ValidationError::NotAllowed {
                field: "channel".to_string(),
                allowed: vec!["regular".to_string(), "wholesale".to_string()],
            }),
        }
    }
}

// =============================================================================
// Balance Strategy
// =============================================================================

/// How a channel keeps a customer's balance of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceStrategy {
    /// `customers.balance` is updated with every ledger entry.
    CachedField,
    /// The balance is the sum of the customer's ledger amounts.
    DerivedSum,
}

impl BalanceStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BalanceStrategy::CachedField => "cached-field",
            BalanceStrategy::DerivedSum => "derived-sum",
        }
    }
}

impl FromStr for BalanceStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cached-field" => Ok(BalanceStrategy::CachedField),
            "derived-sum" => Ok(BalanceStrategy::DerivedSum),
            _ => Err(ValidationError::NotAllowed {
                field: "balance_strategy".to_string(),
                allowed: vec!["cached-field".to_string(), "derived-sum".to_string()],
            }),
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The payment status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    /// Nothing paid yet.
    #[default]
    Pending,
    /// Something paid, balance outstanding.
    Partial,
    /// Balance settled.
    Paid,
    /// Reversed. Terminal.
    Cancelled,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Partial => "partial",
            SaleStatus::Paid => "paid",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, SaleStatus::Cancelled)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the silver a wholesale sale owes back to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SilverReturnStatus {
    /// Not applicable (regular channel).
    #[default]
    Na,
    Pending,
    Partial,
    Completed,
}

// =============================================================================
// Ledger Entry Kind / Payment Mode
// =============================================================================

/// What a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Invoice total charged to the customer.
    Sale,
    /// Cash-equivalent payment.
    Payment,
    /// Payment in silver, valued at a rate.
    SilverPayment,
    /// Silver handed back on a wholesale sale. Always zero amount.
    SilverReturn,
    /// Manual correction, opening balance or cancellation reversal.
    Adjustment,
}

impl EntryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Sale => "sale",
            EntryKind::Payment => "payment",
            EntryKind::SilverPayment => "silver_payment",
            EntryKind::SilverReturn => "silver_return",
            EntryKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payment was tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    #[default]
    Cash,
    Card,
    Upi,
    BankTransfer,
    Cheque,
    Silver,
}

impl FromStr for PaymentMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "card" => Ok(PaymentMode::Card),
            "upi" => Ok(PaymentMode::Upi),
            "bank_transfer" | "bank" => Ok(PaymentMode::BankTransfer),
            "cheque" => Ok(PaymentMode::Cheque),
            "silver" => Ok(PaymentMode::Silver),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_mode".to_string(),
                allowed: ["cash", "card", "upi", "bank_transfer", "cheque", "silver"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer of one billing channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub channel: Channel,
    pub name: String,
    /// Unique per channel for wholesale customers.
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    /// Stored running balance. Only authoritative for `cached-field`
    /// channels; positive means the customer owes the shop.
    pub balance: Money,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Silver Rate
// =============================================================================

/// The price of silver per gram on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SilverRate {
    pub id: String,
    /// One row per date.
    pub rate_date: NaiveDate,
    pub rate_per_gram: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// An invoice, identified to people by its voucher number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// `{prefix}{YYYYMMDD}{NNNN}`, unique and immutable.
    pub voucher_number: String,
    pub customer_id: String,
    pub channel: Channel,
    pub sale_date: NaiveDate,
    /// Rate per gram the invoice was priced at.
    pub silver_rate: Money,

    pub total_net_weight: Weight,
    /// Sum of item wastage percentages.
    pub total_wastage: Percentage,
    pub total_silver_weight: Weight,
    pub total_labor_charges: Money,
    pub subtotal: Money,

    pub tax_applicable: bool,
    pub cgst_rate: TaxRate,
    pub sgst_rate: TaxRate,
    pub cgst: Money,
    pub sgst: Money,
    pub total_amount: Money,

    /// Cumulative cash plus silver valued as cash.
    pub paid_amount: Money,
    /// Cumulative silver paid in kind.
    pub paid_silver: Weight,
    /// What is still payable on this voucher, never below zero.
    pub balance_amount: Money,
    /// Customer balance immediately before the sale.
    pub previous_balance: Money,
    /// Customer balance after the latest operation on this sale.
    pub closing_balance: Money,
    pub status: SaleStatus,

    pub silver_to_return: Weight,
    pub silver_returned: Weight,
    pub silver_return_status: SilverReturnStatus,

    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Silver still owed back to the customer.
    #[inline]
    pub fn silver_remaining(&self) -> Weight {
        self.silver_to_return.saturating_sub(self.silver_returned)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// One measured line of a sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Zero-based position within the invoice.
    pub position: i64,
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub pieces: i64,
    pub gross_weight: Weight,
    pub stone_weight: Weight,
    pub net_weight: Weight,
    pub wastage: Percentage,
    pub touch: Percentage,
    /// Labour charge per kilogram of gross weight.
    pub labor_rate_per_kg: Money,
    pub silver_weight: Weight,
    pub labor_charges: Money,
    pub item_amount: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One append-only row of a customer's ledger.
///
/// ## Chain
/// ```text
/// entry[i].balance_after == entry[i + 1].balance_before
/// entry[i].balance_after == entry[i].balance_before + entry[i].amount
/// ```
/// `seq` fixes the order; the before/after pair is written once and never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    /// Append order across the whole ledger.
    pub seq: i64,
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub kind: EntryKind,
    /// Signed: positive increases what the customer owes.
    pub amount: Money,
    pub silver_weight: Weight,
    pub payment_mode: Option<PaymentMode>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub balance_before: Money,
    pub balance_after: Money,
    pub created_by: String,
    pub transaction_date: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_str() {
        let rate: TaxRate = "1.5".parse().unwrap();
        assert_eq!(rate.bps(), 150);
        assert_eq!(rate.to_string(), "1.50%");
        assert!("-1".parse::<TaxRate>().is_err());
        assert!("1.505".parse::<TaxRate>().is_err());
    }

    #[test]
    fn test_channel_round_trip_names() {
        assert_eq!("Wholesale".parse::<Channel>().unwrap(), Channel::Wholesale);
        assert_eq!(Channel::Regular.to_string(), "regular");
        assert!("retail".parse::<Channel>().is_err());
        assert!(Channel::Wholesale.tracks_silver_return());
        assert!(!Channel::Regular.tracks_silver_return());
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Pending);
        assert!(SaleStatus::Cancelled.is_cancelled());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&EntryKind::SilverPayment).unwrap(),
            "\"silver_payment\""
        );
        assert_eq!(
            serde_json::to_string(&BalanceStrategy::DerivedSum).unwrap(),
            "\"derived-sum\""
        );
        assert_eq!(
            serde_json::to_string(&SilverReturnStatus::Na).unwrap(),
            "\"na\""
        );
    }

    #[test]
    fn test_payment_mode_from_str() {
        assert_eq!("UPI".parse::<PaymentMode>().unwrap(), PaymentMode::Upi);
        assert_eq!(
            "bank_transfer".parse::<PaymentMode>().unwrap(),
            PaymentMode::BankTransfer
        );
        assert!("barter".parse::<PaymentMode>().is_err());
    }
}
