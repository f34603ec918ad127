//! Inventory Log Repository (append-only)

use shared::models::{InventoryLog, InventoryLogType, ReferenceType};
use sqlx::{Executor, Sqlite};

use super::RepoResult;

/// Fields for a new ledger row
#[derive(Debug, Clone)]
pub struct NewInventoryLog {
    pub product_id: i64,
    pub log_type: InventoryLogType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub current_stock: i64,
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<i64>,
    pub actor_id: Option<i64>,
}

pub async fn insert<'e, E>(executor: E, log: &NewInventoryLog, now: i64) -> RepoResult<InventoryLog>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, InventoryLog>(
        r#"
        INSERT INTO inventory_logs (
            product_id, log_type, quantity, previous_stock, current_stock,
            reason, reference_type, reference_id, actor_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(log.product_id)
    .bind(log.log_type)
    .bind(log.quantity)
    .bind(log.previous_stock)
    .bind(log.current_stock)
    .bind(&log.reason)
    .bind(log.reference_type)
    .bind(log.reference_id)
    .bind(log.actor_id)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(row)
}

/// All rows for a product, in insertion order
pub async fn find_by_product<'e, E>(executor: E, product_id: i64) -> RepoResult<Vec<InventoryLog>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, InventoryLog>(
        "SELECT * FROM inventory_logs WHERE product_id = ? ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

pub async fn find_latest<'e, E>(executor: E, product_id: i64) -> RepoResult<Option<InventoryLog>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, InventoryLog>(
        "SELECT * FROM inventory_logs WHERE product_id = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Rows written for one order, in insertion order
pub async fn find_by_order<'e, E>(executor: E, order_id: i64) -> RepoResult<Vec<InventoryLog>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, InventoryLog>(
        "SELECT * FROM inventory_logs WHERE reference_type = 'ORDER' AND reference_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}
