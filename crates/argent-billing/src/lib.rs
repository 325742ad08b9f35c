//! # argent-billing: Ledger Engine and Sale Lifecycle for Argent
//!
//! Every operation that changes what a customer owes lives in this crate,
//! each one a single SQLite transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Caller (HTTP layer, reports)                        │
//! │                               │                                         │
//! │  ┌────────────────────────────▼────────────────────────────────────┐   │
//! │  │                ★ argent-billing (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │  Billing ─┬─ RateProvider        current / as-of / history      │   │
//! │  │           ├─ CustomerDirectory   get-or-create, search, delete  │   │
//! │  │           ├─ SaleLifecycle ──┬── VoucherAllocator               │   │
//! │  │           │                  └── LedgerEngine (apply_delta)     │   │
//! │  │           └─ Reports             stats, daily analysis          │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │          argent-core (pure rules)     argent-db (SQLite)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use argent_billing::{Billing, BillingConfig};
//!
//! let billing = Billing::open(BillingConfig::load(None)?).await?;
//! let created = billing.sales().create_sale(request).await?;
//! ```

pub mod config;
pub mod customers;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod rates;
pub mod reports;
pub mod voucher;

pub use config::{BalanceSettings, BillingConfig, DatabaseSettings, TaxSettings, VoucherSettings};
pub use customers::{
    CustomerDirectory, CustomerPage, CustomerUpdate, CustomerView, DeleteOutcome, NewCustomer,
};
pub use error::{ConfigError, ConfigResult, StartupError};
pub use ledger::{ChainBreak, DateRange, LedgerAudit, LedgerDelta, LedgerEngine};
pub use lifecycle::{
    CreateSaleRequest, CreatedSale, PaymentRequest, SaleDetails, SaleLifecycle, SalePage,
    SaleReceipt, SilverPaymentRequest, SilverReturnRequest, TaxChoice,
};
pub use rates::RateProvider;
pub use reports::{BillingStats, DailyAnalysis, Reports};
pub use voucher::{DailySequenceAllocator, MaxScanAllocator, VoucherAllocator};

use argent_db::Database;
use tracing::info;

/// The billing engine, wired from one configuration.
///
/// Cheap to clone; every component shares the same pool.
#[derive(Debug, Clone)]
pub struct Billing {
    db: Database,
    config: BillingConfig,
    rates: RateProvider,
    ledger: LedgerEngine,
    customers: CustomerDirectory,
    sales: SaleLifecycle,
    reports: Reports,
}

impl Billing {
    /// Validates `config`, opens the database and runs migrations.
    pub async fn open(config: BillingConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let path = config.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }

        let db = Database::new(config.db_config()).await?;
        info!(path = %path.display(), "Billing engine ready");
        Ok(Billing::new(db, config))
    }

    /// Wires the components over an already opened database.
    pub fn new(db: Database, config: BillingConfig) -> Self {
        let ledger = LedgerEngine::new(db.clone(), config.balance);
        Billing {
            rates: RateProvider::new(&db),
            customers: CustomerDirectory::new(db.clone(), config.balance),
            sales: SaleLifecycle::new(
                db.clone(),
                ledger.clone(),
                config.vouchers.clone(),
                config.tax,
            ),
            reports: Reports::new(db.clone(), config.balance),
            ledger,
            db,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn rates(&self) -> &RateProvider {
        &self.rates
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    pub fn customers(&self) -> &CustomerDirectory {
        &self.customers
    }

    pub fn sales(&self) -> &SaleLifecycle {
        &self.sales
    }

    pub fn reports(&self) -> &Reports {
        &self.reports
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================
