//! Product Repository
//!
//! Stock mutations go through [`crate::inventory::apply_movement`]; this
//! module only exposes the row-level primitives it needs.

use shared::models::Product;
use sqlx::{Executor, Sqlite, SqliteConnection};

use super::RepoResult;

/// Fields for a new product row
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub cost_price: Option<f64>,
    pub quantity: i64,
    pub track_inventory: bool,
    pub low_stock_alert: i64,
}

/// Stock view of a product row, read under the write lock
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub track_inventory: bool,
    pub low_stock_alert: i64,
}

pub async fn insert<'e, E>(executor: E, product: &NewProduct, now: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO products (
            name, sku, price, cost_price, quantity, track_inventory,
            low_stock_alert, is_active, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&product.name)
    .bind(&product.sku)
    .bind(product.price)
    .bind(product.cost_price)
    .bind(product.quantity)
    .bind(product.track_inventory)
    .bind(product.low_stock_alert)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Find a product by id, including soft-deleted rows
pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(product)
}

/// Take the write lock on a product row and return its stock view
///
/// Touching `updated_at` makes this a write, so SQLite grants the
/// transaction its RESERVED lock before the quantity is read.
pub async fn lock_stock(
    conn: &mut SqliteConnection,
    id: i64,
    now: i64,
) -> RepoResult<Option<StockRow>> {
    let row = sqlx::query_as::<_, StockRow>(
        r#"
        UPDATE products SET updated_at = ?
        WHERE id = ?
        RETURNING id, name, quantity, track_inventory, low_stock_alert
        "#,
    )
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn set_quantity(
    conn: &mut SqliteConnection,
    id: i64,
    quantity: i64,
    now: i64,
) -> RepoResult<()> {
    sqlx::query("UPDATE products SET quantity = ?, updated_at = ? WHERE id = ?")
        .bind(quantity)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Rename a product; order lines keep their snapshot
pub async fn rename<'e, E>(executor: E, id: i64, name: &str, now: i64) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE products SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
