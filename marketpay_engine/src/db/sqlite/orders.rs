use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewOrder, Order, OrderId, OrderQueryFilter, OrderStatusType, Pagination, PaymentStatus},
};

const ORDER_COLUMNS: &str = "id, buyer_id, seller_id, total_price, currency, status, created_at, updated_at";

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<OrderId, SqliteDatabaseError> {
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (buyer_id, seller_id, total_price, currency, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id;
        "#,
    )
    .bind(order.buyer_id)
    .bind(order.seller_id)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(OrderStatusType::Pending)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order #{id} has been saved in the DB");
    Ok(OrderId(id))
}

pub async fn fetch_order_by_id(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order
pub async fn fetch_orders(
    query: OrderQueryFilter,
    page: Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(seller_id) = query.seller_id {
        where_clause.push("seller_id = ");
        where_clause.push_bind_unseparated(seller_id);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(page.limit());
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {} orders", orders.len());
    Ok(orders)
}

/// Sets the order status to `to`, but only if it is currently `from`. Returns `true` if the order was updated.
pub async fn update_order_status(
    id: OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4")
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .execute(conn)
        .await?;
    let updated = result.rows_affected() == 1;
    if updated {
        debug!("🗃️ Order {id} moved from {from} to {to}");
    }
    Ok(updated)
}

/// Cancels the order, but only if it is currently `from` and none of its payments is `Pending` or `Completed`.
/// Returns `true` if the order was cancelled.
pub async fn cancel_order_without_active_payment(
    id: OrderId,
    from: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
              AND NOT EXISTS (SELECT 1 FROM payments WHERE order_id = $3 AND status IN ($5, $6))
        "#,
    )
    .bind(OrderStatusType::Cancelled)
    .bind(Utc::now())
    .bind(id)
    .bind(from)
    .bind(PaymentStatus::Pending)
    .bind(PaymentStatus::Completed)
    .execute(conn)
    .await?;
    let cancelled = result.rows_affected() == 1;
    if cancelled {
        debug!("🗃️ Order {id} moved from {from} to Cancelled");
    }
    Ok(cancelled)
}
