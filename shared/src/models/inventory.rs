//! Inventory Ledger Model

use serde::{Deserialize, Serialize};

/// Stock movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum InventoryLogType {
    In,
    Out,
    Adjustment,
    Damage,
    Return,
    StockTake,
}

impl InventoryLogType {
    /// Direction of the movement: +1 increases stock, -1 decreases it,
    /// 0 means the movement sets an absolute count.
    pub fn direction(&self) -> i64 {
        match self {
            Self::In | Self::Return => 1,
            Self::Out | Self::Damage => -1,
            Self::Adjustment | Self::StockTake => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Adjustment => "ADJUSTMENT",
            Self::Damage => "DAMAGE",
            Self::Return => "RETURN",
            Self::StockTake => "STOCK_TAKE",
        }
    }
}

/// What triggered a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ReferenceType {
    Order,
    Manual,
}

/// Immutable ledger row
///
/// `current_stock = previous_stock ± quantity` according to `log_type`.
/// Rows are append-only; nothing updates or deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct InventoryLog {
    pub id: i64,
    pub product_id: i64,
    pub log_type: InventoryLogType,
    /// Unsigned magnitude of the change
    pub quantity: i64,
    pub previous_stock: i64,
    pub current_stock: i64,
    pub reason: Option<String>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub created_at: i64,
}

impl InventoryLog {
    /// Check that the logged stock numbers agree with the movement type
    pub fn is_consistent(&self) -> bool {
        match self.log_type.direction() {
            1 => self.current_stock == self.previous_stock + self.quantity,
            -1 => self.current_stock == self.previous_stock - self.quantity,
            _ => (self.current_stock - self.previous_stock).abs() == self.quantity,
        }
    }
}
