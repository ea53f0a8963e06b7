use thiserror::Error;

use crate::{
    db::traits::PaymentGatewayError,
    db_types::{Money, OrderId, PaymentId, PaymentStatus, ProviderTag},
    gateway::ProviderError,
    state_machine::TransitionError,
};

/// Everything that can go wrong while creating, confirming, refunding or reconciling a payment.
#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("No payment carries the provider transaction id {0}")]
    TransactionNotFound(String),
    #[error("The payment amount {actual} does not match the order total {expected}")]
    AmountMismatch { expected: Money, actual: Money },
    #[error("Order {0} already has a pending or completed payment")]
    DuplicatePayment(OrderId),
    #[error("Payment {payment_id} has already been processed. Its status is {status}")]
    AlreadyProcessed { payment_id: PaymentId, status: PaymentStatus },
    #[error("No payment provider is configured for {0}")]
    UnsupportedProvider(ProviderTag),
    #[error("Payment {payment_id} is {status}, which does not allow this operation")]
    InvalidState { payment_id: PaymentId, status: PaymentStatus },
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("Payment confirmation failed. {0}")]
    ConfirmationFailed(ProviderError),
    #[error("{0}")]
    ProviderError(ProviderError),
    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
    #[error("The record was modified concurrently: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl PaymentFlowError {
    /// A stable, machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) | Self::PaymentNotFound(_) | Self::TransactionNotFound(_) => "NOT_FOUND",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::DuplicatePayment(_) => "DUPLICATE_PAYMENT",
            Self::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            Self::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::ConfirmationFailed(_) => "CONFIRMATION_FAILED",
            Self::ProviderError(_) => "PROVIDER_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "NOT_FOUND"
    }
}

impl From<PaymentGatewayError> for PaymentFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::DatabaseError(s) => Self::DatabaseError(s),
            PaymentGatewayError::OrderNotFound(id) => Self::OrderNotFound(id),
            PaymentGatewayError::PaymentNotFound(id) => Self::PaymentNotFound(id),
            PaymentGatewayError::TransactionNotFound(txn) => Self::TransactionNotFound(txn),
            PaymentGatewayError::DuplicatePayment(id) | PaymentGatewayError::ActivePayment(id) => {
                Self::DuplicatePayment(id)
            },
            PaymentGatewayError::PaymentStatusConflict { payment_id, actual, .. } => {
                Self::AlreadyProcessed { payment_id, status: actual }
            },
            e @ PaymentGatewayError::OrderStatusConflict { .. } => Self::Conflict(e.to_string()),
            PaymentGatewayError::InvalidTransition(e) => Self::InvalidTransition(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Not allowed: {0}")]
    Forbidden(String),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("The order was modified concurrently: {0}")]
    Conflict(String),
    #[error("Order {0} has a pending or completed payment. Refund or fail the payment first")]
    ActivePayment(OrderId),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidOrder(_) => "INVALID_REQUEST",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::ActivePayment(_) => "ACTIVE_PAYMENT",
            Self::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

impl From<PaymentGatewayError> for OrderFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(id) => Self::OrderNotFound(id),
            PaymentGatewayError::InvalidTransition(e) => Self::InvalidTransition(e),
            e @ PaymentGatewayError::OrderStatusConflict { .. } => Self::Conflict(e.to_string()),
            PaymentGatewayError::ActivePayment(id) => Self::ActivePayment(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
