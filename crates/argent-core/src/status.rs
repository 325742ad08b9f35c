//! # Sale Settlement Rules
//!
//! The arithmetic that moves a sale between states. Every money-moving
//! operation in argent-billing calls into here, so the status rule exists in
//! exactly one place.
//!
//! ## State Machine
//! ```text
//!                 payment               payment
//!   ┌─────────┐  (balance > 0)  ┌─────────┐  (balance <= 0)  ┌──────┐
//!   │ Pending │ ──────────────► │ Partial │ ───────────────► │ Paid │
//!   └────┬────┘                 └────┬────┘                  └──┬───┘
//!        │          cancel_sale      │                          │
//!        └───────────────┬───────────┴──────────────────────────┘
//!                        ▼
//!                  ┌───────────┐
//!                  │ Cancelled │  terminal, never derived
//!                  └───────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Channel, SaleStatus, SilverReturnStatus};
use crate::weight::Weight;

/// The one status rule.
///
/// `paid` when nothing remains, `partial` when something was paid and
/// something remains, `pending` otherwise.
///
/// ## Example
/// ```rust
/// use argent_core::status::derive_status;
/// use argent_core::{Money, SaleStatus};
///
/// assert_eq!(derive_status(Money::zero(), Money::from_rupees(10)), SaleStatus::Paid);
/// assert_eq!(derive_status(Money::from_rupees(5), Money::from_rupees(10)), SaleStatus::Partial);
/// assert_eq!(derive_status(Money::from_rupees(5), Money::zero()), SaleStatus::Pending);
/// ```
pub fn derive_status(balance_amount: Money, paid_amount: Money) -> SaleStatus {
    if !balance_amount.is_positive() {
        SaleStatus::Paid
    } else if paid_amount.is_positive() {
        SaleStatus::Partial
    } else {
        SaleStatus::Pending
    }
}

/// Fails with [`CoreError::InvalidSaleStatus`] for a cancelled sale.
pub fn ensure_open(sale_id: &str, status: SaleStatus) -> CoreResult<()> {
    if status.is_cancelled() {
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale_id.to_string(),
            status,
        });
    }
    Ok(())
}

// =============================================================================
// New Sale
// =============================================================================

/// How a new sale's up-front payment settles against its total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningSettlement {
    /// Value of the silver paid in kind.
    pub paid_silver_value: Money,
    /// Cash plus silver value.
    pub effective_paid: Money,
    /// `total − effective_paid`, unfloored. Moves the customer balance.
    pub obligation: Money,
    /// The obligation floored at zero, stored on the sale.
    pub balance_amount: Money,
    pub status: SaleStatus,
}

/// Settles a new sale's up-front cash and silver against its total.
pub fn open_settlement(
    total_amount: Money,
    paid_cash: Money,
    paid_silver: Weight,
    silver_rate: Money,
) -> OpeningSettlement {
    let paid_silver_value = silver_rate.for_weight(paid_silver);
    let effective_paid = paid_cash + paid_silver_value;
    let obligation = total_amount - effective_paid;
    let balance_amount = obligation.floor_zero();

    OpeningSettlement {
        paid_silver_value,
        effective_paid,
        obligation,
        balance_amount,
        status: derive_status(balance_amount, effective_paid),
    }
}

// =============================================================================
// Payments
// =============================================================================

/// A sale's payment fields after one more payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub paid_amount: Money,
    pub balance_amount: Money,
    pub status: SaleStatus,
}

/// Applies a cash-equivalent payment to a sale's running figures.
pub fn settle_payment(
    paid_amount: Money,
    balance_amount: Money,
    payment: Money,
) -> PaymentSettlement {
    let paid_amount = paid_amount + payment;
    let balance_amount = (balance_amount - payment).floor_zero();
    PaymentSettlement {
        paid_amount,
        balance_amount,
        status: derive_status(balance_amount, paid_amount),
    }
}

// =============================================================================
// Silver Return
// =============================================================================

/// Starting silver-return state for a sale of `total_silver_weight`.
pub fn opening_silver_return(
    channel: Channel,
    total_silver_weight: Weight,
) -> (Weight, SilverReturnStatus) {
    if channel.tracks_silver_return() {
        (total_silver_weight, SilverReturnStatus::Pending)
    } else {
        (Weight::zero(), SilverReturnStatus::Na)
    }
}

/// Checks a return of `weight` and gives the new returned total and status.
///
/// ## Errors
/// - [`CoreError::InvalidAmount`] for a non-positive weight
/// - [`CoreError::ExceedsRemaining`] when `weight` is more than is owed
pub fn settle_silver_return(
    silver_to_return: Weight,
    silver_returned: Weight,
    weight: Weight,
) -> CoreResult<(Weight, SilverReturnStatus)> {
    if !weight.is_positive() {
        return Err(CoreError::invalid_amount(format!(
            "silver return weight must be greater than zero, got {} g",
            weight
        )));
    }

    let remaining = silver_to_return.saturating_sub(silver_returned);
    if weight > remaining {
        return Err(CoreError::ExceedsRemaining {
            requested: weight,
            remaining,
        });
    }

    let returned = silver_returned + weight;
    let status = if returned >= silver_to_return {
        SilverReturnStatus::Completed
    } else {
        SilverReturnStatus::Partial
    };
    Ok((returned, status))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status_boundaries() {
        assert_eq!(derive_status(Money::zero(), Money::zero()), SaleStatus::Paid);
        assert_eq!(derive_status(Money::from_paise(-1), Money::zero()), SaleStatus::Paid);
        assert_eq!(
            derive_status(Money::from_paise(1), Money::from_paise(1)),
            SaleStatus::Partial
        );
        assert_eq!(derive_status(Money::from_paise(1), Money::zero()), SaleStatus::Pending);
    }

    #[test]
    fn test_opening_with_cash_and_silver() {
        // ₹5892.50 total, ₹3000 cash, 10 g silver at ₹75/g
        let s = open_settlement(
            Money::from_paise(589_250),
            Money::from_rupees(3000),
            Weight::from_grams(10),
            Money::from_rupees(75),
        );
        assert_eq!(s.paid_silver_value, Money::from_rupees(750));
        assert_eq!(s.effective_paid, Money::from_rupees(3750));
        assert_eq!(s.balance_amount, Money::from_paise(214_250));
        assert_eq!(s.obligation, s.balance_amount);
        assert_eq!(s.status, SaleStatus::Partial);
    }

    #[test]
    fn test_opening_overpaid_keeps_obligation_unfloored() {
        let s = open_settlement(
            Money::from_rupees(100),
            Money::from_rupees(150),
            Weight::zero(),
            Money::from_rupees(75),
        );
        assert_eq!(s.obligation, Money::from_rupees(-50));
        assert_eq!(s.balance_amount, Money::zero());
        assert_eq!(s.status, SaleStatus::Paid);
    }

    #[test]
    fn test_opening_unpaid_is_pending() {
        let s = open_settlement(
            Money::from_rupees(100),
            Money::zero(),
            Weight::zero(),
            Money::from_rupees(75),
        );
        assert_eq!(s.status, SaleStatus::Pending);
        assert_eq!(s.balance_amount, Money::from_rupees(100));
    }

    #[test]
    fn test_settle_payment_to_paid() {
        let s = settle_payment(
            Money::from_rupees(3750),
            Money::from_paise(214_250),
            Money::from_paise(214_250),
        );
        assert_eq!(s.balance_amount, Money::zero());
        assert_eq!(s.paid_amount, Money::from_paise(589_250));
        assert_eq!(s.status, SaleStatus::Paid);
    }

    #[test]
    fn test_settle_payment_floors_balance() {
        let s = settle_payment(Money::zero(), Money::from_rupees(10), Money::from_rupees(25));
        assert_eq!(s.balance_amount, Money::zero());
        assert_eq!(s.paid_amount, Money::from_rupees(25));
    }

    #[test]
    fn test_silver_return_rules() {
        let owed = Weight::from_milligrams(77_900);

        assert!(matches!(
            settle_silver_return(owed, Weight::zero(), Weight::from_grams(80)),
            Err(CoreError::ExceedsRemaining { remaining, .. }) if remaining == owed
        ));
        assert!(matches!(
            settle_silver_return(owed, Weight::zero(), Weight::zero()),
            Err(CoreError::InvalidAmount { .. })
        ));

        let (returned, status) =
            settle_silver_return(owed, Weight::zero(), Weight::from_grams(30)).unwrap();
        assert_eq!(status, SilverReturnStatus::Partial);

        let (returned, status) =
            settle_silver_return(owed, returned, Weight::from_milligrams(47_900)).unwrap();
        assert_eq!(returned, owed);
        assert_eq!(status, SilverReturnStatus::Completed);
    }

    #[test]
    fn test_opening_silver_return_per_channel() {
        let w = Weight::from_grams(5);
        assert_eq!(
            opening_silver_return(Channel::Wholesale, w),
            (w, SilverReturnStatus::Pending)
        );
        assert_eq!(
            opening_silver_return(Channel::Regular, w),
            (Weight::zero(), SilverReturnStatus::Na)
        );
    }

    #[test]
    fn test_ensure_open() {
        assert!(ensure_open("s1", SaleStatus::Paid).is_ok());
        assert!(matches!(
            ensure_open("s1", SaleStatus::Cancelled),
            Err(CoreError::InvalidSaleStatus { .. })
        ));
    }
}
