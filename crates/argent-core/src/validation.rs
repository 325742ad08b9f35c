//! # Validation Module
//!
//! Input validation for customer records and operation requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (HTTP layer, outside this workspace)                  │
//! │  ├── Authentication, payload parsing                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: argent-billing operation                                     │
//! │  ├── Type validation (ItemInput parsing, Money/Weight parsing)          │
//! │  └── THIS MODULE: field rules, before the first write                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE (voucher_number, wholesale phone)                          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use argent_core::validation::{validate_customer_name, validate_phone};
//!
//! validate_customer_name("Ramesh Jewellers").unwrap();
//! let phone = validate_phone(" 98765 43210 ").unwrap();
//! assert_eq!(phone, "9876543210");
//! ```

use crate::error::ValidationError;
use crate::types::TaxRate;
use crate::weight::Weight;
use crate::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text note stored on a sale or ledger entry.
pub const MAX_NOTES_LEN: usize = 500;

// =============================================================================
// Customer Validators
// =============================================================================

/// Validates a customer name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates and normalizes a phone number.
///
/// ## Rules
/// - Spaces and hyphens are dropped, a leading `+` is kept
/// - 7 to 15 digits remain
///
/// ## Returns
/// The normalized phone, which is the key wholesale customers are found by.
///
/// ## Example
/// ```rust
/// use argent_core::validation::validate_phone;
///
/// assert_eq!(validate_phone("+91 98765-43210").unwrap(), "+919876543210");
/// assert!(validate_phone("12ab").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();

    if phone.is_empty() {
        return Err(ValidationError::Required {
            field: "phone".to_string(),
        });
    }

    let (plus, rest) = match phone.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", phone),
    };
    let digits: String = rest.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) || !(7..=15).contains(&digits.len()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain 7 to 15 digits".to_string(),
        });
    }

    Ok(format!("{}{}", plus, digits))
}

/// Validates an optional email address. Empty counts as absent.
pub fn validate_email(email: Option<&str>) -> ValidationResult<Option<String>> {
    let email = match email.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(e) => e,
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@domain".to_string(),
        });
    }

    Ok(Some(email.to_string()))
}

/// Validates an optional GSTIN (15 alphanumeric characters, upper-cased).
pub fn validate_gst_number(gst: Option<&str>) -> ValidationResult<Option<String>> {
    let gst = match gst.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(g) => g.to_ascii_uppercase(),
    };

    if gst.len() != 15 || !gst.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "gst_number".to_string(),
            reason: "must be 15 letters and digits".to_string(),
        });
    }

    Ok(Some(gst))
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates the actor an operation is attributed to.
pub fn validate_actor(actor: &str) -> ValidationResult<()> {
    if actor.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "created_by".to_string(),
        });
    }
    Ok(())
}

/// Validates free-text notes and drops empty ones.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        }),
        Some(n) => Ok(Some(n.to_string())),
    }
}

/// Validates an up-front amount paid with a new sale.
///
/// ## Rules
/// - Zero is allowed (nothing paid yet)
/// - Negative is not
pub fn validate_non_negative_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Same as [`validate_non_negative_money`] for silver weights.
pub fn validate_non_negative_weight(field: &str, weight: Weight) -> ValidationResult<()> {
    if weight.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.bps() > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use argent_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_customer_name() {
        assert!(validate_customer_name("Ramesh Jewellers").is_ok());
        assert!(validate_customer_name("").is_err());
        assert!(validate_customer_name("   ").is_err());
        assert!(validate_customer_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("9876543210").unwrap(), "9876543210");
        assert_eq!(validate_phone("98765 43210").unwrap(), "9876543210");
        assert_eq!(validate_phone("+91-98765-43210").unwrap(), "+919876543210");

        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("98765x3210").is_err());
        assert!(validate_phone(&"9".repeat(16)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(None).unwrap(), None);
        assert_eq!(validate_email(Some(" ")).unwrap(), None);
        assert_eq!(
            validate_email(Some("shop@example.in")).unwrap(),
            Some("shop@example.in".to_string())
        );
        assert!(validate_email(Some("shop.example.in")).is_err());
        assert!(validate_email(Some("@example.in")).is_err());
    }

    #[test]
    fn test_validate_gst_number() {
        assert_eq!(
            validate_gst_number(Some("27aapfu0939f1zv")).unwrap(),
            Some("27AAPFU0939F1ZV".to_string())
        );
        assert!(validate_gst_number(Some("27AAPFU")).is_err());
        assert_eq!(validate_gst_number(None).unwrap(), None);
    }

    #[test]
    fn test_validate_notes() {
        assert_eq!(validate_notes(Some("  ")).unwrap(), None);
        assert_eq!(validate_notes(Some(" ok ")).unwrap(), Some("ok".to_string()));
        assert!(validate_notes(Some(&"n".repeat(MAX_NOTES_LEN + 1))).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_non_negative_money("paid_amount", Money::zero()).is_ok());
        assert!(validate_non_negative_money("paid_amount", Money::from_paise(-1)).is_err());
        assert!(validate_non_negative_weight("paid_silver", Weight::from_milligrams(-1)).is_err());
        assert!(validate_tax_rate(TaxRate::from_bps(10_000)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_actor_and_uuid() {
        assert!(validate_actor("user-1").is_ok());
        assert!(validate_actor(" ").is_err());
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("123").is_err());
    }
}
