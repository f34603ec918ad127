//! Order-level stock movements
//!
//! Applies one ledger movement per order line inside the caller's
//! transaction. Any failure aborts the caller's transaction, so either every
//! line of an order is moved or none is.

use shared::models::{InventoryLogType, Order};
use sqlx::SqliteConnection;

use super::PipelineResult;
use crate::db::repository::order as order_repo;
use crate::inventory::{Movement, StockChange, StockPolicy, apply_movement};

/// Decrement stock for every tracked line of a settled order (OUT rows)
pub(crate) async fn decrement_for_order(
    conn: &mut SqliteConnection,
    order: &Order,
    policy: StockPolicy,
    actor_id: Option<i64>,
    now: i64,
) -> PipelineResult<Vec<StockChange>> {
    let reason = format!("Sale {}", order.order_number);
    move_order_lines(conn, order, InventoryLogType::Out, reason, policy, actor_id, now).await
}

/// Give back stock for every tracked line of a cancelled order (IN rows)
pub(crate) async fn restore_for_order(
    conn: &mut SqliteConnection,
    order: &Order,
    actor_id: Option<i64>,
    now: i64,
) -> PipelineResult<Vec<StockChange>> {
    let reason = format!("Cancelled order {}", order.order_number);
    move_order_lines(
        conn,
        order,
        InventoryLogType::In,
        reason,
        StockPolicy::AllowOversell,
        actor_id,
        now,
    )
    .await
}

async fn move_order_lines(
    conn: &mut SqliteConnection,
    order: &Order,
    log_type: InventoryLogType,
    reason: String,
    policy: StockPolicy,
    actor_id: Option<i64>,
    now: i64,
) -> PipelineResult<Vec<StockChange>> {
    let items = order_repo::find_items(&mut *conn, order.id).await?;
    let mut changes = Vec::with_capacity(items.len());
    for item in &items {
        let movement =
            Movement::for_order(log_type, item.quantity, order.id, reason.clone(), actor_id);
        if let Some(change) = apply_movement(&mut *conn, item.product_id, &movement, policy, now).await? {
            changes.push(change);
        }
    }
    Ok(changes)
}
