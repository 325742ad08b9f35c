//! # Error Types
//!
//! Domain-specific error types for argent-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  argent-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  argent-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, carries CoreError           │
//! │                                                                         │
//! │  Caller-facing                                                          │
//! │  └── ErrorReport      - { code, message } (serialized)                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorReport → Caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (voucher, ID, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error maps to a stable [`ErrorKind`] code

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::money::Money;
use crate::types::{Channel, SaleStatus};
use crate::weight::Weight;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is raised before the first write of an operation, or causes
/// the operation's transaction to roll back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Customer cannot be found.
    ///
    /// ## When This Occurs
    /// - Customer ID doesn't exist
    /// - Customer belongs to the other billing channel
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// No silver rate is available to price the operation.
    ///
    /// ## When This Occurs
    /// - The request carries no rate and no active rate exists on or before
    ///   the sale date
    #[error("No active silver rate on or before {0}")]
    RateNotFound(String),

    /// A payment, return or adjustment amount is not acceptable.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The operation is not available on the sale's channel.
    ///
    /// ## When This Occurs
    /// - Silver return on a regular sale
    #[error("{operation} is not available for {channel} sales")]
    InvalidChannel {
        operation: &'static str,
        channel: Channel,
    },

    /// A silver return is larger than what is still owed.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale owes 77.900 g, 0 g returned
    ///      │
    ///      ▼
    /// add_silver_return(80 g)
    ///      │
    ///      ▼
    /// ExceedsRemaining { requested: 80.000, remaining: 77.900 }
    /// ```
    #[error("Cannot return {requested} g of silver: only {remaining} g remaining")]
    ExceedsRemaining { requested: Weight, remaining: Weight },

    /// All 9999 voucher numbers for a prefix and date are taken.
    #[error("Voucher numbers exhausted for prefix '{prefix}' on {date}")]
    VoucherExhausted { prefix: String, date: String },

    /// Item measurements could not be turned into an invoice.
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Paying or returning silver against a cancelled sale
    /// - Cancelling a sale twice
    #[error("Sale {sale_id} is {status}, cannot perform operation")]
    InvalidSaleStatus { sale_id: String, status: SaleStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for an [`CoreError::InvalidAmount`] with a message.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Rejection of a non-positive money amount.
    pub fn non_positive(field: &str, amount: Money) -> Self {
        CoreError::invalid_amount(format!("{} must be greater than zero, got {}", field, amount))
    }

    /// The stable code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::CustomerNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::RateNotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            CoreError::InvalidChannel { .. } => ErrorKind::InvalidChannel,
            CoreError::ExceedsRemaining { .. } => ErrorKind::ExceedsRemaining,
            CoreError::VoucherExhausted { .. } => ErrorKind::VoucherExhausted,
            CoreError::Calculation(_) => ErrorKind::CalculationError,
            CoreError::InvalidSaleStatus { .. } => ErrorKind::InvalidStatus,
            CoreError::Validation(ValidationError::Duplicate { .. }) => ErrorKind::Conflict,
            CoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }

    /// Serializable `{ code, message }` pair for callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any write happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid phone, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., a second customer with the same phone).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Error Kind / Report
// =============================================================================

/// Stable, machine-readable error codes.
///
/// Serialized as SCREAMING_SNAKE_CASE (`NOT_FOUND`, `EXCEEDS_REMAINING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InvalidChannel,
    ExceedsRemaining,
    VoucherExhausted,
    CalculationError,
    InvalidStatus,
    ValidationError,
    Conflict,
    DatabaseError,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidAmount => "INVALID_AMOUNT",
            ErrorKind::InvalidChannel => "INVALID_CHANNEL",
            ErrorKind::ExceedsRemaining => "EXCEEDS_REMAINING",
            ErrorKind::VoucherExhausted => "VOUCHER_EXHAUSTED",
            ErrorKind::CalculationError => "CALCULATION_ERROR",
            ErrorKind::InvalidStatus => "INVALID_STATUS",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::DatabaseError => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller sees when an operation fails.
///
/// ## Example JSON
/// ```json
/// {
///   "code": "EXCEEDS_REMAINING",
///   "message": "Cannot return 80.000 g of silver: only 77.900 g remaining"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        ErrorReport {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ExceedsRemaining {
            requested: Weight::from_grams(80),
            remaining: Weight::from_milligrams(77_900),
        };
        assert_eq!(
            err.to_string(),
            "Cannot return 80.000 g of silver: only 77.900 g remaining"
        );

        let err = CoreError::InvalidChannel {
            operation: "Silver return",
            channel: Channel::Regular,
        };
        assert_eq!(err.to_string(), "Silver return is not available for regular sales");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(CoreError::SaleNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::non_positive("amount", Money::zero()).kind(),
            ErrorKind::InvalidAmount
        );
        let dup: CoreError = ValidationError::Duplicate {
            field: "phone".into(),
            value: "9876543210".into(),
        }
        .into();
        assert_eq!(dup.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_report_serializes_screaming_code() {
        let report = CoreError::VoucherExhausted {
            prefix: "REG".into(),
            date: "2024-03-05".into(),
        }
        .report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], "VOUCHER_EXHAUSTED");
        assert_eq!(
            json["message"],
            "Voucher numbers exhausted for prefix 'REG' on 2024-03-05"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::ValidationError);
    }
}
