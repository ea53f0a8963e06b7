use crate::{
    db_types::{Order, OrderId, OrderStatusType, Payment, PaymentId},
    state_machine::TransitionError,
};

pub enum InsertPaymentResult {
    Inserted(PaymentId),
    /// Another active payment already exists for the order.
    AlreadyExists(OrderId),
}

/// A payment status change, and the order status change it caused.
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub payment: Payment,
    pub order: Order,
    /// The order status before the change, if the order status changed.
    pub previous_order_status: Option<OrderStatusType>,
    /// Set when the payment change was recorded but the order could not follow it.
    pub order_conflict: Option<TransitionError>,
}

impl PaymentTransition {
    pub fn order_status_changed(&self) -> bool {
        self.previous_order_status.is_some()
    }
}

/// The result of applying a provider-reported status to a payment.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// The payment changed status.
    Applied(PaymentTransition),
    /// The payment already had the reported status. Nothing was written.
    Unchanged(Payment),
    /// The reported status cannot follow the payment's current status. Nothing was written.
    Ignored(Payment),
}
