use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType, PaymentId, PaymentStatus},
    state_machine::TransitionError,
};

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("There is no payment for provider transaction {0}")]
    TransactionNotFound(String),
    #[error("Order {0} already has an active payment")]
    DuplicatePayment(OrderId),
    #[error("Order {0} has a pending or completed payment")]
    ActivePayment(OrderId),
    #[error("Payment {payment_id} was expected to be {expected}, but is {actual}")]
    PaymentStatusConflict { payment_id: PaymentId, expected: PaymentStatus, actual: PaymentStatus },
    #[error("Order {order_id} was expected to be {expected}, but is {actual}")]
    OrderStatusConflict { order_id: OrderId, expected: OrderStatusType, actual: OrderStatusType },
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
