//! # argent-core: Pure Billing Logic for Argent
//!
//! This crate is the **heart** of Argent. It contains the billing arithmetic
//! and sale rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Argent Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Caller (HTTP layer, reports, exports)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ function calls                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    argent-billing                               │   │
//! │  │    create_sale, add_payment, add_silver_return, ledger audit    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ argent-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  money /  │  │  invoice  │  │  status / │  │   │
//! │  │   │ Customer  │  │  weight   │  │ calculator│  │  voucher  │  │   │
//! │  │   │ Sale      │  │ fixed-pt  │  │           │  │  rules    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    argent-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Sale, LedgerEntry, etc.)
//! - [`money`] / [`weight`] - Fixed-point Money, Weight, Percentage
//! - [`decimal`] - Parsing and rounding through `rust_decimal`
//! - [`invoice`] - The invoice calculator
//! - [`status`] - Sale status and settlement rules
//! - [`voucher`] - Voucher number format
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system and clock access is FORBIDDEN here
//! 3. **Integer Quantities**: paise, milligrams, thousandths of a percent
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use argent_core::money::Money;
//! use argent_core::types::TaxRate;
//!
//! let subtotal = Money::from_paise(100_000); // ₹1000.00
//! let cgst = subtotal.calculate_tax(TaxRate::from_bps(150)); // 1.5%
//! assert_eq!(cgst.paise(), 1_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod decimal;
pub mod error;
pub mod invoice;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;
pub mod voucher;
pub mod weight;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use argent_core::Money` instead of
// `use argent_core::money::Money`

pub use error::{CoreError, CoreResult, ErrorKind, ErrorReport, ValidationError};
pub use invoice::{Invoice, InvoiceLine, ItemInput, ItemMeasurement, RawNumber};
pub use money::Money;
pub use types::*;
pub use weight::{Percentage, Weight};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Highest voucher sequence per prefix and day.
pub const MAX_DAILY_VOUCHERS: u32 = 9999;

/// Default voucher prefix of the regular channel.
pub const REGULAR_VOUCHER_PREFIX: &str = "REG";

/// Default voucher prefix of the wholesale channel (none).
pub const WHOLESALE_VOUCHER_PREFIX: &str = "";
