//! # argent-db: Ledger Storage for Argent
//!
//! SQLite persistence for customers, silver rates, sales, sale items, the
//! append-only ledger and the daily voucher counters.
//!
//! ```text
//!   argent-billing unit of work
//!        │ db.begin()                       db.sales() / db.ledger() ...
//!        ▼                                        │
//!   Transaction ── associated fns ──┐             │ &self reads
//!                                    ▼             ▼
//!                       repository::{customer, rate, sale, ledger, voucher}
//!                                    │
//!                                    ▼
//!                        SQLite (WAL, foreign keys, triggers)
//! ```
//!
//! Schema lives in `migrations/sqlite/` and is applied by
//! [`Database::new`]. Every repository query is runtime-checked
//! (`sqlx::query_as` with `.bind`), so the crate builds without a live
//! database.
//!
//! ```rust,ignore
//! use argent_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("argent.db")).await?;
//! let today = db.rates().current().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::{CustomerFilter, CustomerRepository, MAX_PAGE_SIZE};
pub use repository::ledger::{LedgerRepository, ReceivedTotals};
pub use repository::rate::{RateRepository, UpsertOutcome};
pub use repository::sale::{PaymentUpdate, SaleFilter, SaleRepository, SaleTotals};
pub use repository::voucher::VoucherSequenceRepository;
