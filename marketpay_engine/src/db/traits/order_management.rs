use crate::{
    db::traits::PaymentGatewayError,
    db_types::{NewOrder, Order, OrderId, OrderQueryFilter, OrderStatusType, Pagination},
};

/// The `OrderManagement` trait defines the behaviour for querying and updating orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order with `Pending` status and returns it.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Orders matching every criterion in `filter`, newest first.
    async fn search_orders(
        &self,
        filter: OrderQueryFilter,
        page: Pagination,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Changes the order status from `from` to `to`, provided the order is still in `from`. Callers validate the
    /// transition itself.
    ///
    /// Returns `OrderStatusConflict` if the order has moved on since the caller read it.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError>;

    /// Moves the order from `from` to `Cancelled`, in one statement that also checks that the order has no `Pending`
    /// or `Completed` payment.
    ///
    /// Returns `ActivePayment` if it has one, and `OrderStatusConflict` if the order has moved on since the caller
    /// read it.
    async fn cancel_unpaid_order(&self, order_id: OrderId, from: OrderStatusType) -> Result<Order, PaymentGatewayError>;
}
