//! Payment Repository
//!
//! One row per settlement attempt. The partial unique index
//! `idx_payments_single_completed` rejects a second COMPLETED row per order.

use shared::models::{Payment, PaymentMethod, PaymentStatus, TransactionType};
use sqlx::{Executor, Sqlite, SqliteConnection};

use super::{RepoResult, sql_in_list};

/// Fields for a new payment row
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    pub amount: f64,
    pub status: PaymentStatus,
    pub transaction_type: TransactionType,
    pub gateway_name: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub reference_number: Option<String>,
    pub gateway_response: Option<String>,
    pub verified_by: Option<i64>,
    pub verified_at: Option<i64>,
    pub verification_notes: Option<String>,
    pub paid_at: Option<i64>,
    pub expired_at: Option<i64>,
}

impl NewPayment {
    /// Bare payment row, remaining fields empty
    pub fn new(order_id: i64, method: PaymentMethod, amount: f64, status: PaymentStatus) -> Self {
        Self {
            order_id,
            payment_method: method,
            amount,
            status,
            transaction_type: TransactionType::Payment,
            gateway_name: None,
            gateway_transaction_id: None,
            reference_number: None,
            gateway_response: None,
            verified_by: None,
            verified_at: None,
            verification_notes: None,
            paid_at: None,
            expired_at: None,
        }
    }
}

/// Outcome written onto open (PENDING/PROCESSING) attempts
#[derive(Debug, Clone, Copy)]
pub struct AttemptUpdate<'a> {
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<&'a str>,
    pub gateway_response: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub now: i64,
}

const OPEN_STATUSES: [PaymentStatus; 2] = [PaymentStatus::Pending, PaymentStatus::Processing];

pub async fn insert<'e, E>(executor: E, payment: &NewPayment, now: i64) -> RepoResult<Payment>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (
            order_id, payment_method, amount, status, transaction_type,
            gateway_name, gateway_transaction_id, reference_number, gateway_response,
            verified_by, verified_at, verification_notes, paid_at, expired_at,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.payment_method)
    .bind(payment.amount)
    .bind(payment.status)
    .bind(payment.transaction_type)
    .bind(&payment.gateway_name)
    .bind(&payment.gateway_transaction_id)
    .bind(&payment.reference_number)
    .bind(&payment.gateway_response)
    .bind(payment.verified_by)
    .bind(payment.verified_at)
    .bind(&payment.verification_notes)
    .bind(payment.paid_at)
    .bind(payment.expired_at)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// All attempts for an order, oldest first
pub async fn find_by_order<'e, E>(executor: E, order_id: i64) -> RepoResult<Vec<Payment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE order_id = ? ORDER BY id")
        .bind(order_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

pub async fn count_by_statuses<'e, E>(
    executor: E,
    order_id: i64,
    statuses: &[PaymentStatus],
) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT COUNT(*) FROM payments WHERE order_id = ? AND status IN ({})",
        sql_in_list(statuses.iter().map(PaymentStatus::as_str))
    );
    let (count,): (i64,) = sqlx::query_as(&sql).bind(order_id).fetch_one(executor).await?;
    Ok(count)
}

/// Number of gateway attempts ever made for an order
pub async fn count_gateway_attempts<'e, E>(executor: E, order_id: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM payments WHERE order_id = ? AND payment_method = 'GATEWAY'",
    )
    .bind(order_id)
    .fetch_one(executor)
    .await?;
    Ok(count)
}

/// Resolve the open attempts of an order (optionally only one gateway reference)
///
/// Returns the number of rows changed.
pub async fn resolve_open_attempts(
    conn: &mut SqliteConnection,
    order_id: i64,
    reference: Option<&str>,
    update: &AttemptUpdate<'_>,
) -> RepoResult<u64> {
    let mut sql = format!(
        r#"
        UPDATE payments SET
            status = ?1,
            gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
            gateway_response = COALESCE(?3, gateway_response),
            verification_notes = COALESCE(?4, verification_notes),
            paid_at = CASE WHEN ?1 = 'COMPLETED' THEN ?5 ELSE paid_at END,
            expired_at = CASE WHEN ?1 = 'EXPIRED' THEN ?5 ELSE expired_at END,
            updated_at = ?5
        WHERE order_id = ?6 AND status IN ({})
        "#,
        sql_in_list(OPEN_STATUSES.iter().map(PaymentStatus::as_str))
    );
    if reference.is_some() {
        sql.push_str(" AND reference_number = ?7");
    }

    let mut query = sqlx::query(&sql)
        .bind(update.status)
        .bind(update.gateway_transaction_id)
        .bind(update.gateway_response)
        .bind(update.notes)
        .bind(update.now)
        .bind(order_id);
    if let Some(reference) = reference {
        query = query.bind(reference);
    }
    let result = query.execute(conn).await?;
    Ok(result.rows_affected())
}

/// Settle a gateway attempt by reference, including one already superseded
pub async fn complete_gateway_attempt(
    conn: &mut SqliteConnection,
    order_id: i64,
    reference: &str,
    gateway_transaction_id: Option<&str>,
    gateway_response: Option<&str>,
    now: i64,
) -> RepoResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET
            status = 'COMPLETED',
            gateway_transaction_id = COALESCE(?, gateway_transaction_id),
            gateway_response = COALESCE(?, gateway_response),
            paid_at = ?, updated_at = ?
        WHERE order_id = ? AND reference_number = ?
          AND status IN ('PENDING', 'PROCESSING', 'FAILED', 'EXPIRED')
        "#,
    )
    .bind(gateway_transaction_id)
    .bind(gateway_response)
    .bind(now)
    .bind(now)
    .bind(order_id)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Record a capture on an attempt that must not become COMPLETED
///
/// Applies to the attempt with this reference in any state but COMPLETED or
/// REFUNDED. Returns the number of rows changed.
pub async fn note_late_capture(
    conn: &mut SqliteConnection,
    order_id: i64,
    reference: &str,
    update: &AttemptUpdate<'_>,
) -> RepoResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET
            status = ?,
            gateway_transaction_id = COALESCE(?, gateway_transaction_id),
            gateway_response = COALESCE(?, gateway_response),
            verification_notes = ?,
            updated_at = ?
        WHERE order_id = ? AND reference_number = ?
          AND status NOT IN ('COMPLETED', 'REFUNDED')
        "#,
    )
    .bind(update.status)
    .bind(update.gateway_transaction_id)
    .bind(update.gateway_response)
    .bind(update.notes)
    .bind(update.now)
    .bind(order_id)
    .bind(reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn refund_completed(conn: &mut SqliteConnection, order_id: i64, now: i64) -> RepoResult<u64> {
    let result = sqlx::query(
        "UPDATE payments SET status = 'REFUNDED', updated_at = ? WHERE order_id = ? AND status = 'COMPLETED'",
    )
    .bind(now)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Record a verified gateway notification; `false` if it was seen before
///
/// A missing fraud status is stored as an empty string so it stays part of
/// the key.
pub async fn record_notification<'e, E>(
    executor: E,
    gateway_order_id: &str,
    transaction_status: &str,
    fraud_status: Option<&str>,
    status_code: &str,
    payload: &str,
    now: i64,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO gateway_notifications
            (gateway_order_id, transaction_status, fraud_status, status_code, payload, received_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(gateway_order_id)
    .bind(transaction_status)
    .bind(fraud_status.unwrap_or_default())
    .bind(status_code)
    .bind(payload)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn notification_seen<'e, E>(
    executor: E,
    gateway_order_id: &str,
    transaction_status: &str,
    fraud_status: Option<&str>,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT 1 FROM gateway_notifications
        WHERE gateway_order_id = ? AND transaction_status = ? AND fraud_status = ?
        "#,
    )
    .bind(gateway_order_id)
    .bind(transaction_status)
    .bind(fraud_status.unwrap_or_default())
    .fetch_optional(executor)
    .await?;
    Ok(row.is_some())
}
