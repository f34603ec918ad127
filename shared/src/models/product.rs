//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity
///
/// `quantity` is the live on-hand count. It is only ever changed together with
/// an inventory log row, and only when `track_inventory` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    pub cost_price: Option<f64>,
    pub quantity: i64,
    pub track_inventory: bool,
    /// Alert threshold for downstream notification, not a hard cap
    pub low_stock_alert: i64,
    pub is_active: bool,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// Whether the product can be referenced by a new order
    pub fn is_orderable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}
