use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};

use super::{db_url, new_pool, orders, payments, run_migrations, SqliteDatabaseError};
use crate::{
    db::traits::{
        InsertPaymentResult,
        OrderManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PaymentManagement,
        PaymentTransition,
        WebhookOutcome,
    },
    db_types::{
        CanonicalStatus,
        NewOrder,
        NewPayment,
        Order,
        OrderId,
        OrderQueryFilter,
        OrderStatusType,
        Pagination,
        Payment,
        PaymentId,
        PaymentStatus,
        PaymentUpdate,
    },
    state_machine::TransitionError,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `MPG_DATABASE_URL`, or the default.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool for {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        run_migrations(&self.pool).await
    }
}

/// Re-reads a payment after a conditional update matched nothing, and reports why.
async fn payment_conflict(
    payment_id: PaymentId,
    expected: PaymentStatus,
    conn: &mut SqliteConnection,
) -> PaymentGatewayError {
    match payments::fetch_payment_by_id(payment_id, conn).await {
        Ok(Some(p)) => PaymentGatewayError::PaymentStatusConflict { payment_id, expected, actual: p.status },
        Ok(None) => PaymentGatewayError::PaymentNotFound(payment_id),
        Err(e) => e.into(),
    }
}

/// What happens when the order of a payment cannot follow the payment's new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderStep {
    /// The whole write is rolled back.
    Required,
    /// The payment change is kept, the order is left alone and the refusal is reported in the transition. Used when
    /// the provider has already moved the money.
    BestEffort,
}

/// Drives the order of a payment that has just changed status. `next` decides the target status given the current
/// one; `None` leaves the order alone.
async fn drive_order_status<F>(
    payment: Payment,
    next: F,
    step: OrderStep,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransition, PaymentGatewayError>
where
    F: FnOnce(OrderStatusType) -> Result<Option<OrderStatusType>, TransitionError>,
{
    let order_id = payment.order_id;
    let order = orders::fetch_order_by_id(order_id, conn).await?.ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
    let current = order.status;
    let target = match (next(current), step) {
        (Ok(target), _) => target,
        (Err(e), OrderStep::BestEffort) => {
            warn!("🗃️ Payment {} is now {}, but order {order_id} cannot follow. {e}", payment.id, payment.status);
            return Ok(PaymentTransition { payment, order, previous_order_status: None, order_conflict: Some(e) });
        },
        (Err(e), OrderStep::Required) => return Err(e.into()),
    };
    match target {
        Some(to) => {
            let updated = orders::update_order_status(order_id, current, to, conn).await?;
            let order = orders::fetch_order_by_id(order_id, conn)
                .await?
                .ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
            if !updated {
                return Err(PaymentGatewayError::OrderStatusConflict {
                    order_id,
                    expected: current,
                    actual: order.status,
                });
            }
            Ok(PaymentTransition { payment, order, previous_order_status: Some(current), order_conflict: None })
        },
        None => {
            trace!("🗃️ Order {order_id} is already {current}");
            Ok(PaymentTransition { payment, order, previous_order_status: None, order_conflict: None })
        },
    }
}

fn next_order_status(
    status: CanonicalStatus,
    current: OrderStatusType,
) -> Result<Option<OrderStatusType>, TransitionError> {
    match status {
        CanonicalStatus::Completed => current.on_payment_completed(),
        CanonicalStatus::Refunded => current.on_payment_refunded(),
        CanonicalStatus::Failed => Ok(None),
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let id = orders::insert_order(order, &mut tx).await?;
        let order = orders::fetch_order_by_id(id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn order_by_id(&self, order_id: OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(
        &self,
        filter: OrderQueryFilter,
        page: Pagination,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders(filter, page, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_order_status(order_id, from, to, &mut tx).await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
        if !updated {
            return Err(PaymentGatewayError::OrderStatusConflict { order_id, expected: from, actual: order.status });
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn cancel_unpaid_order(&self, order_id: OrderId, from: OrderStatusType) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::cancel_order_without_active_payment(order_id, from, &mut tx).await?;
        let order =
            orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(PaymentGatewayError::OrderNotFound(order_id))?;
        if !cancelled {
            if order.status != from {
                return Err(PaymentGatewayError::OrderStatusConflict { order_id, expected: from, actual: order.status });
            }
            return Err(PaymentGatewayError::ActivePayment(order_id));
        }
        tx.commit().await?;
        Ok(order)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn payment_by_id(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_id(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn payment_by_external_txn_id(&self, txn_id: &str) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_external_txn_id(txn_id, &mut conn).await?;
        Ok(payment)
    }

    async fn payments_for_order(
        &self,
        order_id: OrderId,
        page: Pagination,
    ) -> Result<Vec<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, page, &mut conn).await?;
        Ok(payments)
    }

    async fn exists_active_for_order(&self, order_id: OrderId) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let exists = payments::active_payment_exists(order_id, &mut conn).await?;
        Ok(exists)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let id = match payments::insert_payment(payment, &mut tx).await? {
            InsertPaymentResult::Inserted(id) => id,
            InsertPaymentResult::AlreadyExists(order_id) => {
                return Err(PaymentGatewayError::DuplicatePayment(order_id));
            },
        };
        let payment =
            payments::fetch_payment_by_id(id, &mut tx).await?.ok_or(PaymentGatewayError::PaymentNotFound(id))?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn attach_external_txn_id(
        &self,
        payment_id: PaymentId,
        external_txn_id: &str,
        raw_response: Value,
    ) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        if !payments::attach_external_txn_id(payment_id, external_txn_id, raw_response, &mut tx).await? {
            return Err(payment_conflict(payment_id, PaymentStatus::Pending, &mut tx).await);
        }
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} is now known to its provider as {external_txn_id}");
        Ok(payment)
    }

    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        external_txn_id: &str,
        raw_response: Value,
    ) -> Result<PaymentTransition, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let update = PaymentUpdate::new(PaymentStatus::Completed)
            .with_external_txn_id(external_txn_id)
            .with_raw_response(raw_response)
            .with_paid_at(Utc::now());
        if !payments::update_payment_status(payment_id, PaymentStatus::Pending, update, &mut tx).await? {
            return Err(payment_conflict(payment_id, PaymentStatus::Pending, &mut tx).await);
        }
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        let transition =
            drive_order_status(payment, |s| s.on_payment_completed(), OrderStep::BestEffort, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} completed with provider transaction {external_txn_id}");
        Ok(transition)
    }

    async fn fail_payment(&self, payment_id: PaymentId, raw_response: Value) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let update = PaymentUpdate::new(PaymentStatus::Failed).with_raw_response(raw_response);
        if !payments::update_payment_status(payment_id, PaymentStatus::Pending, update, &mut tx).await? {
            return Err(payment_conflict(payment_id, PaymentStatus::Pending, &mut tx).await);
        }
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} marked as failed");
        Ok(payment)
    }

    async fn refund_payment(
        &self,
        payment_id: PaymentId,
        raw_response: Value,
    ) -> Result<PaymentTransition, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let update =
            PaymentUpdate::new(PaymentStatus::Refunded).with_raw_response(raw_response).with_refunded_at(Utc::now());
        if !payments::update_payment_status(payment_id, PaymentStatus::Completed, update, &mut tx).await? {
            return Err(payment_conflict(payment_id, PaymentStatus::Completed, &mut tx).await);
        }
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        let transition =
            drive_order_status(payment, |s| s.on_payment_refunded(), OrderStep::BestEffort, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} refunded");
        Ok(transition)
    }

    async fn apply_canonical_status(
        &self,
        external_txn_id: &str,
        status: CanonicalStatus,
    ) -> Result<WebhookOutcome, PaymentGatewayError> {
        // Resolve the id outside the transaction, so that the transaction's first statement is the write.
        let payment_id = {
            let mut conn = self.pool.acquire().await?;
            payments::payment_id_for_external_txn_id(external_txn_id, &mut conn)
                .await?
                .ok_or_else(|| PaymentGatewayError::TransactionNotFound(external_txn_id.to_string()))?
        };
        let source = status.required_source();
        let target = status.target();
        let now = Utc::now();
        let update = match status {
            CanonicalStatus::Completed => PaymentUpdate::new(target).with_paid_at(now),
            CanonicalStatus::Refunded => PaymentUpdate::new(target).with_refunded_at(now),
            CanonicalStatus::Failed => PaymentUpdate::new(target),
        };
        let mut tx = self.pool.begin().await?;
        if !payments::update_payment_status(payment_id, source, update, &mut tx).await? {
            let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
                .await?
                .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
            tx.rollback().await?;
            return if payment.status == target {
                trace!("🗃️ Payment {payment_id} is already {target}");
                Ok(WebhookOutcome::Unchanged(payment))
            } else {
                warn!("🗃️ Payment {payment_id} is {}. Cannot apply {status}", payment.status);
                Ok(WebhookOutcome::Ignored(payment))
            };
        }
        let payment = payments::fetch_payment_by_id(payment_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        let transition =
            drive_order_status(payment, |s| next_order_status(status, s), OrderStep::Required, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {status} applied to payment {payment_id} ({external_txn_id})");
        Ok(WebhookOutcome::Applied(transition))
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
