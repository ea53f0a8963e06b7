//! Order status transitions.
//!
//! Requested transitions (seller updates, buyer cancellations) must follow this table exactly:
//!
//! | From        | To                      |
//! |-------------|-------------------------|
//! | `Pending`   | `Paid`, `Cancelled`     |
//! | `Paid`      | `Confirmed`, `Cancelled`|
//! | `Confirmed` | `Shipping`              |
//! | `Shipping`  | `Delivered`             |
//!
//! `Delivered` and `Cancelled` are terminal.
//!
//! Transitions driven by a payment outcome are side effects of the payment write and accept a wider set of source
//! states, all of them before the order ships:
//! * payment completion moves `Pending` or `Paid` orders to `Confirmed`,
//! * a refund moves `Pending`, `Paid` or `Confirmed` orders to `Cancelled`.
//!
//! In both cases an order that is already at the target status is left alone.
use thiserror::Error;

use crate::db_types::OrderStatusType::{self, Cancelled, Confirmed, Delivered, Paid, Pending, Shipping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("An order cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
}

impl OrderStatusType {
    pub fn can_transition_to(&self, to: OrderStatusType) -> bool {
        matches!(
            (self, to),
            (Pending, Paid) |
                (Pending, Cancelled) |
                (Paid, Confirmed) |
                (Paid, Cancelled) |
                (Confirmed, Shipping) |
                (Shipping, Delivered)
        )
    }

    /// Validates a requested transition against the status table.
    pub fn transition_to(&self, to: OrderStatusType) -> Result<OrderStatusType, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: *self, to })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Delivered | Cancelled)
    }

    /// The status an order moves to when one of its payments completes. `None` means no change is needed.
    pub fn on_payment_completed(&self) -> Result<Option<OrderStatusType>, TransitionError> {
        match self {
            Pending | Paid => Ok(Some(Confirmed)),
            Confirmed => Ok(None),
            from => Err(TransitionError { from: *from, to: Confirmed }),
        }
    }

    /// The status an order moves to when its payment is refunded. `None` means no change is needed.
    pub fn on_payment_refunded(&self) -> Result<Option<OrderStatusType>, TransitionError> {
        match self {
            Pending | Paid | Confirmed => Ok(Some(Cancelled)),
            Cancelled => Ok(None),
            from => Err(TransitionError { from: *from, to: Cancelled }),
        }
    }
}
