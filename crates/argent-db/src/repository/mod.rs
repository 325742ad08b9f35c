//! # Repository Module
//!
//! Database repository implementations for Argent.
//!
//! ## Two Kinds of Operation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Pool vs Unit-of-Work Operations                      │
//! │                                                                         │
//! │  Reports, lookups                    Money-moving operations           │
//! │       │                                     │                           │
//! │       │  db.sales().list(&filter)           │  let mut tx = db.begin()  │
//! │       ▼                                     ▼                           │
//! │  &self methods                       associated fns taking             │
//! │  (borrow a pooled connection)        conn: &mut SqliteConnection       │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                                      tx.commit() or drop → rollback    │
//! │                                                                         │
//! │  A unit of work never touches the pool while it holds its             │
//! │  transaction: an in-memory database has exactly one connection.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and cached balances
//! - [`RateRepository`](rate::RateRepository) - Silver rate history
//! - [`SaleRepository`](sale::SaleRepository) - Sales and sale items
//! - [`LedgerRepository`](ledger::LedgerRepository) - Append-only ledger entries
//! - [`VoucherSequenceRepository`](voucher::VoucherSequenceRepository) - Daily voucher counters

pub mod customer;
pub mod ledger;
pub mod rate;
pub mod sale;
pub mod voucher;
