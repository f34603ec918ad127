//! Order Repository
//!
//! Status writes are compare-and-set: every `UPDATE` carries the status the
//! caller observed (or the set it accepts) in its `WHERE` clause and reports
//! whether a row matched. A `false` means another writer got there first.

use shared::models::{
    Order, OrderItem, OrderSource, OrderStatus, OrderType, PaymentMethod, PaymentStatus,
};
use sqlx::{Executor, Sqlite, SqliteConnection};

use super::{RepoResult, sql_in_list};

/// Fields for a new order row
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub order_type: OrderType,
    pub order_source: OrderSource,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub table_number: Option<String>,
    pub notes: Option<String>,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub service_charge: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub payment_method: Option<PaymentMethod>,
    pub created_by: Option<i64>,
}

/// Fields for a new order line (snapshot of the product at order time)
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub cost_price: Option<f64>,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub notes: Option<String>,
}

/// New gateway token for an order
#[derive(Debug, Clone, Copy)]
pub struct GatewaySession<'a> {
    pub order_id: i64,
    pub token: &'a str,
    pub redirect_url: &'a str,
    pub gateway_order_id: &'a str,
    pub now: i64,
}

/// Close an order that never got paid
#[derive(Debug, Clone, Copy)]
pub struct CloseUnpaid<'a> {
    pub order_id: i64,
    pub payment_status: PaymentStatus,
    pub reason: &'a str,
    pub now: i64,
    /// Order statuses the close may start from
    pub from: &'a [OrderStatus],
    /// Payment statuses the close may start from, empty means any
    pub from_payment: &'a [PaymentStatus],
    /// Only close if the token was issued at or before this instant
    pub issued_at_or_before: Option<i64>,
}

pub async fn insert(conn: &mut SqliteConnection, order: &NewOrder, now: i64) -> RepoResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO orders (
            order_number, order_type, order_source, status, payment_status,
            customer_name, customer_phone, customer_email, table_number, notes,
            subtotal, discount_amount, tax_amount, service_charge, delivery_fee,
            total_amount, paid_amount, change_amount, payment_method,
            created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&order.order_number)
    .bind(order.order_type)
    .bind(order.order_source)
    .bind(OrderStatus::PendingPayment)
    .bind(PaymentStatus::Pending)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.customer_email)
    .bind(&order.table_number)
    .bind(&order.notes)
    .bind(order.subtotal)
    .bind(order.discount_amount)
    .bind(order.tax_amount)
    .bind(order.service_charge)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .bind(order.created_by)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn insert_item(
    conn: &mut SqliteConnection,
    order_id: i64,
    item: &NewOrderItem,
) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            order_id, product_id, product_name, product_sku, quantity, unit_price,
            cost_price, discount_amount, tax_amount, total_amount, notes
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.product_name)
    .bind(&item.product_sku)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.cost_price)
    .bind(item.discount_amount)
    .bind(item.tax_amount)
    .bind(item.total_amount)
    .bind(&item.notes)
    .execute(conn)
    .await?;
    Ok(())
}

/// Find a live (not soft-deleted) order, without items
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(executor)
            .await?;
    Ok(order)
}

/// Lines in display (insertion) order
pub async fn find_items<'e, E>(executor: E, order_id: i64) -> RepoResult<Vec<OrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ? ORDER BY id")
            .bind(order_id)
            .fetch_all(executor)
            .await?;
    Ok(items)
}

/// Resolve a gateway correlation id (current or superseded attempt) to an order id
pub async fn find_id_by_gateway_reference<'e, E>(
    executor: E,
    reference: &str,
) -> RepoResult<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM orders WHERE gateway_order_id = ?1
        UNION
        SELECT order_id FROM payments WHERE reference_number = ?1 AND payment_method = 'GATEWAY'
        LIMIT 1
        "#,
    )
    .bind(reference)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Settle the order: status PAID, payment COMPLETED, `paid_at` set once
pub async fn mark_paid(
    conn: &mut SqliteConnection,
    order_id: i64,
    paid_amount: f64,
    change_amount: f64,
    method: PaymentMethod,
    now: i64,
) -> RepoResult<bool> {
    let sql = format!(
        r#"
        UPDATE orders SET
            status = 'PAID', payment_status = 'COMPLETED',
            paid_amount = ?, change_amount = ?, payment_method = ?,
            paid_at = COALESCE(paid_at, ?), updated_at = ?
        WHERE id = ? AND deleted_at IS NULL AND status IN ({})
        "#,
        sql_in_list(OrderStatus::SETTLEABLE.iter().map(OrderStatus::as_str))
    );
    let result = sqlx::query(&sql)
        .bind(paid_amount)
        .bind(change_amount)
        .bind(method)
        .bind(now)
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Lifecycle timestamp column written when entering `status`
fn timestamp_column(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Paid => Some("paid_at"),
        OrderStatus::Preparing => Some("preparing_at"),
        OrderStatus::Ready => Some("ready_at"),
        OrderStatus::Completed => Some("completed_at"),
        OrderStatus::Cancelled => Some("cancelled_at"),
        _ => None,
    }
}

/// Move `from -> to`, stamping the lifecycle timestamp only if unset
pub async fn transition<'e, E>(
    executor: E,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    now: i64,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stamp = timestamp_column(to)
        .map(|col| format!("{col} = COALESCE({col}, ?1),"))
        .unwrap_or_default();
    let sql = format!(
        "UPDATE orders SET status = ?2, {stamp} updated_at = ?1 \
         WHERE id = ?3 AND status = ?4 AND deleted_at IS NULL"
    );
    let result = sqlx::query(&sql)
        .bind(now)
        .bind(to)
        .bind(order_id)
        .bind(from)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_cancelled(
    conn: &mut SqliteConnection,
    order_id: i64,
    from: OrderStatus,
    reason: Option<&str>,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = 'CANCELLED', cancelled_at = COALESCE(cancelled_at, ?),
            cancellation_reason = ?, updated_at = ?
        WHERE id = ? AND status = ? AND deleted_at IS NULL
        "#,
    )
    .bind(now)
    .bind(reason)
    .bind(now)
    .bind(order_id)
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_refunded(
    conn: &mut SqliteConnection,
    order_id: i64,
    from: OrderStatus,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = 'REFUNDED', payment_status = 'REFUNDED', updated_at = ?
        WHERE id = ? AND status = ? AND deleted_at IS NULL
        "#,
    )
    .bind(now)
    .bind(order_id)
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Gateway flagged the capture for review
pub async fn mark_awaiting_confirmation(
    conn: &mut SqliteConnection,
    order_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET status = 'AWAITING_CONFIRMATION', payment_status = 'PROCESSING', updated_at = ?
        WHERE id = ? AND status IN ('DRAFT', 'PENDING_PAYMENT') AND deleted_at IS NULL
        "#,
    )
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Cancel an unpaid order with a terminal payment status (FAILED or EXPIRED)
pub async fn close_unpaid(conn: &mut SqliteConnection, close: &CloseUnpaid<'_>) -> RepoResult<bool> {
    let mut sql = format!(
        r#"
        UPDATE orders SET
            status = 'CANCELLED', payment_status = ?, cancelled_at = COALESCE(cancelled_at, ?),
            cancellation_reason = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL AND paid_at IS NULL AND status IN ({})
        "#,
        sql_in_list(close.from.iter().map(OrderStatus::as_str))
    );
    if !close.from_payment.is_empty() {
        sql.push_str(&format!(
            " AND payment_status IN ({})",
            sql_in_list(close.from_payment.iter().map(PaymentStatus::as_str))
        ));
    }
    if close.issued_at_or_before.is_some() {
        sql.push_str(" AND payment_token IS NOT NULL AND token_issued_at <= ?");
    }

    let mut query = sqlx::query(&sql)
        .bind(close.payment_status)
        .bind(close.now)
        .bind(close.reason)
        .bind(close.now)
        .bind(close.order_id);
    if let Some(cutoff) = close.issued_at_or_before {
        query = query.bind(cutoff);
    }
    let result = query.execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Store the first gateway token of an order
pub async fn set_gateway_session(
    conn: &mut SqliteConnection,
    session: &GatewaySession<'_>,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_token = ?, payment_redirect_url = ?, gateway_order_id = ?,
            token_issued_at = ?, payment_status = 'PENDING', status = 'PENDING_PAYMENT',
            payment_method = 'GATEWAY', updated_at = ?
        WHERE id = ? AND status IN ('DRAFT', 'PENDING_PAYMENT')
          AND payment_token IS NULL AND deleted_at IS NULL
        "#,
    )
    .bind(session.token)
    .bind(session.redirect_url)
    .bind(session.gateway_order_id)
    .bind(session.now)
    .bind(session.now)
    .bind(session.order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the gateway token for a retry, reopening a cancelled unpaid order
///
/// Guarded on the exact status, payment status and correlation id the caller
/// observed, so two racing retries cannot both win.
pub async fn replace_gateway_session(
    conn: &mut SqliteConnection,
    session: &GatewaySession<'_>,
    observed_status: OrderStatus,
    observed_payment_status: PaymentStatus,
    observed_gateway_order_id: Option<&str>,
) -> RepoResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_token = ?, payment_redirect_url = ?, gateway_order_id = ?,
            token_issued_at = ?, payment_status = 'PENDING', status = 'PENDING_PAYMENT',
            payment_method = 'GATEWAY', cancelled_at = NULL, cancellation_reason = NULL,
            updated_at = ?
        WHERE id = ? AND status = ? AND payment_status = ? AND gateway_order_id IS ?
          AND paid_at IS NULL AND deleted_at IS NULL
        "#,
    )
    .bind(session.token)
    .bind(session.redirect_url)
    .bind(session.gateway_order_id)
    .bind(session.now)
    .bind(session.now)
    .bind(session.order_id)
    .bind(observed_status)
    .bind(observed_payment_status)
    .bind(observed_gateway_order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Soft delete, terminal orders only
pub async fn soft_delete<'e, E>(executor: E, order_id: i64, now: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE orders SET deleted_at = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL AND status IN ('COMPLETED', 'CANCELLED', 'REFUNDED')
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(order_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Orders whose pending gateway token was issued at or before `cutoff`
pub async fn find_expired_token_ids<'e, E>(executor: E, cutoff: i64) -> RepoResult<Vec<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM orders
        WHERE status = 'PENDING_PAYMENT'
          AND payment_status IN ('PENDING', 'PROCESSING')
          AND payment_token IS NOT NULL
          AND token_issued_at <= ?
          AND deleted_at IS NULL
        ORDER BY id
        "#,
    )
    .bind(cutoff)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_columns() {
        assert_eq!(timestamp_column(OrderStatus::Paid), Some("paid_at"));
        assert_eq!(timestamp_column(OrderStatus::Ready), Some("ready_at"));
        assert_eq!(timestamp_column(OrderStatus::Refunded), None);
        assert_eq!(timestamp_column(OrderStatus::PendingPayment), None);
    }
}
