use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{OrderManagement, PaymentGatewayError},
    db_types::{is_valid_currency_code, NewOrder, Order, OrderId, OrderQueryFilter, OrderStatusType, Pagination},
    events::{EventProducers, OrderStatusChangedEvent},
    mpe_api::errors::OrderFlowError,
};

/// `OrderFlowApi` handles order placement and the status changes that buyers and sellers request directly.
///
/// Requested changes follow the order status table in [`crate::state_machine`]:
///
/// | From      | To                 | Requested by |
/// |-----------|--------------------|--------------|
/// | Pending   | Paid, Cancelled    | seller; buyer may cancel |
/// | Paid      | Confirmed, Cancelled | seller; buyer may cancel |
/// | Confirmed | Shipping           | seller       |
/// | Shipping  | Delivered          | seller       |
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Places a new order. It starts out `Pending`.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        if !order.total_price.is_positive() {
            return Err(OrderFlowError::InvalidOrder(format!("The order total must be positive, not {}", order.total_price)));
        }
        if !is_valid_currency_code(&order.currency) {
            return Err(OrderFlowError::InvalidOrder(format!("{} is not a currency code", order.currency)));
        }
        let order = self.db.insert_order(order).await?;
        info!(
            "🔄️📦️ Order {} placed by buyer {} with seller {} for {} {}",
            order.id, order.buyer_id, order.seller_id, order.total_price, order.currency
        );
        Ok(order)
    }

    pub async fn order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.order_by_id(order_id).await?)
    }

    pub async fn search_orders(&self, filter: OrderQueryFilter, page: Pagination) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.search_orders(filter, page).await?)
    }

    /// Moves an order to `status`, provided the order status table allows it.
    pub async fn update_order_status(&self, order_id: OrderId, status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        self.transition(order, status).await
    }

    /// A seller moves one of their orders along, e.g. to `Shipping` once it has been dispatched.
    pub async fn update_status_as_seller(
        &self,
        order_id: OrderId,
        seller_id: i64,
        status: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.seller_id != seller_id {
            warn!("🔄️📦️ Seller {seller_id} tried to update order {order_id}, which belongs to seller {}", order.seller_id);
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} does not belong to seller {seller_id}")));
        }
        self.transition(order, status).await
    }

    /// A buyer cancels one of their orders. Only `Pending` and `Paid` orders can be cancelled, and only while no payment
    /// for the order is `Pending` or `Completed`.
    pub async fn cancel_as_buyer(&self, order_id: OrderId, buyer_id: i64) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.buyer_id != buyer_id {
            warn!("🔄️📦️ Buyer {buyer_id} tried to cancel order {order_id}, which belongs to buyer {}", order.buyer_id);
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} does not belong to buyer {buyer_id}")));
        }
        self.transition(order, OrderStatusType::Cancelled).await
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, OrderFlowError> {
        self.db.order_by_id(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    async fn transition(&self, order: Order, status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let from = order.status;
        let to = from.transition_to(status)?;
        let updated = match to {
            // Never cancel an order under a payment that is pending or completed
            OrderStatusType::Cancelled => self.db.cancel_unpaid_order(order.id, from).await.map_err(|e| {
                if let PaymentGatewayError::ActivePayment(_) = e {
                    info!("🔄️📦️ Order {} was not cancelled. It has an active payment.", order.id);
                }
                OrderFlowError::from(e)
            })?,
            _ => self.db.update_order_status(order.id, from, to).await?,
        };
        debug!("🔄️📦️ Order {} moved from {from} to {to}", updated.id);
        for emitter in &self.producers.order_status_changed_producer {
            emitter.publish_event(OrderStatusChangedEvent::new(from, updated.clone())).await;
        }
        Ok(updated)
    }
}
