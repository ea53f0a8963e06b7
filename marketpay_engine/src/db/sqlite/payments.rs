use chrono::Utc;
use log::{debug, trace};
use serde_json::Value;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPaymentResult},
    db_types::{NewPayment, OrderId, Pagination, Payment, PaymentId, PaymentStatus, PaymentUpdate},
};

const PAYMENT_COLUMNS: &str = "id, order_id, amount, currency, method, status, provider, external_txn_id, \
                               raw_response, created_at, paid_at, refunded_at, updated_at";

/// Inserts a new `Pending` payment.
///
/// The partial unique index on active payments guarantees that a concurrent insert for the same order fails. That
/// failure is reported as `AlreadyExists` rather than as an error.
pub async fn insert_payment(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    let now = Utc::now();
    let order_id = payment.order_id;
    let result = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO payments (order_id, amount, currency, method, status, provider, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.method)
    .bind(PaymentStatus::Pending)
    .bind(payment.provider)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(id) => {
            debug!("🗃️ Payment #{id} for order {order_id} has been saved in the DB");
            Ok(InsertPaymentResult::Inserted(PaymentId(id)))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Order {order_id} already has an active payment");
            Ok(InsertPaymentResult::AlreadyExists(order_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_by_id(
    id: PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn fetch_payment_by_external_txn_id(
    txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE external_txn_id = $1 ORDER BY id DESC LIMIT 1"
    ))
    .bind(txn_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: OrderId,
    page: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, SqliteDatabaseError> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id ASC LIMIT $2 OFFSET $3"
    ))
    .bind(order_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} payments fetched for order {order_id}", payments.len());
    Ok(payments)
}

pub async fn active_payment_exists(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payments WHERE order_id = $1 AND status IN ($2, $3)",
    )
    .bind(order_id)
    .bind(PaymentStatus::Pending)
    .bind(PaymentStatus::Completed)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// Applies `update` to the payment, but only if its status is currently `from`. Fields that are `None` in the update
/// keep their stored values. Returns `true` if the payment was updated.
///
/// Run this as the first statement of a transaction so that the write lock is taken before anything is read.
pub async fn update_payment_status(
    id: PaymentId,
    from: PaymentStatus,
    update: PaymentUpdate,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let to = update.status;
    let result = sqlx::query(
        r#"
            UPDATE payments SET
                status = $1,
                external_txn_id = COALESCE($2, external_txn_id),
                raw_response = COALESCE($3, raw_response),
                paid_at = COALESCE($4, paid_at),
                refunded_at = COALESCE($5, refunded_at),
                updated_at = $6
            WHERE id = $7 AND status = $8
        "#,
    )
    .bind(to)
    .bind(update.external_txn_id)
    .bind(update.raw_response.map(Json))
    .bind(update.paid_at)
    .bind(update.refunded_at)
    .bind(Utc::now())
    .bind(id)
    .bind(from)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    if updated {
        debug!("🗃️ Payment {id} moved from {from} to {to}");
    } else {
        trace!("🗃️ Payment {id} was not {from}. No update made.");
    }
    Ok(updated)
}

/// Records the provider's id for a payment that is still `Pending` and has none yet. Returns `true` if the payment
/// was updated.
pub async fn attach_external_txn_id(
    id: PaymentId,
    txn_id: &str,
    raw_response: Value,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE payments SET external_txn_id = $1, raw_response = $2, updated_at = $3
            WHERE id = $4 AND status = $5 AND external_txn_id IS NULL
        "#,
    )
    .bind(txn_id)
    .bind(Json(raw_response))
    .bind(Utc::now())
    .bind(id)
    .bind(PaymentStatus::Pending)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    if updated {
        trace!("🗃️ Payment {id} attached to provider transaction {txn_id}");
    }
    Ok(updated)
}

/// Looks up the payment id carrying the given provider transaction id.
pub async fn payment_id_for_external_txn_id(
    txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentId>, SqliteDatabaseError> {
    let id = sqlx::query_scalar::<_, PaymentId>(
        "SELECT id FROM payments WHERE external_txn_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(txn_id)
    .fetch_optional(conn)
    .await?;
    Ok(id)
}
