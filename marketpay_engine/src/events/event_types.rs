use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Payment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub payment: Payment,
    pub order: Order,
}

impl PaymentCompletedEvent {
    pub fn new(payment: Payment, order: Order) -> Self {
        Self { payment, order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub payment: Payment,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new(payment: Payment, reason: String) -> Self {
        Self { payment, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub payment: Payment,
    pub order: Order,
}

impl PaymentRefundedEvent {
    pub fn new(payment: Payment, order: Order) -> Self {
        Self { payment, order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }
}
