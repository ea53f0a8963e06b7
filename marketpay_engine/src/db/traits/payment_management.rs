use crate::{
    db::traits::PaymentGatewayError,
    db_types::{OrderId, Pagination, Payment, PaymentId},
};

/// Read-only queries over payments.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    async fn payment_by_id(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentGatewayError>;

    /// The most recent payment carrying the given provider transaction id.
    async fn payment_by_external_txn_id(&self, txn_id: &str) -> Result<Option<Payment>, PaymentGatewayError>;

    /// Payments for the order, oldest first.
    async fn payments_for_order(
        &self,
        order_id: OrderId,
        page: Pagination,
    ) -> Result<Vec<Payment>, PaymentGatewayError>;

    /// True if the order has a `Pending` or `Completed` payment.
    async fn exists_active_for_order(&self, order_id: OrderId) -> Result<bool, PaymentGatewayError>;
}
