//! Inventory Ledger
//!
//! [`apply_movement`] is the only code path that changes `products.quantity`.
//! It runs inside the caller's transaction and always writes the quantity and
//! its ledger row together, so the product count equals the `current_stock`
//! of the latest log row at every commit.

mod service;

pub use service::{AdjustStockRequest, InventoryLedger, LedgerCheck};

use shared::models::{InventoryLog, InventoryLogType, ReferenceType};
use sqlx::SqliteConnection;

use crate::db::repository::{inventory as log_repo, product as product_repo};
use crate::notify::PosEvent;
use crate::orders::{PipelineError, PipelineResult};

/// What to do when a decrement would take stock below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPolicy {
    /// Reject with `InsufficientStock`
    Strict,
    /// Allow negative stock and log a warning (money already collected)
    AllowOversell,
}

/// One requested stock movement
#[derive(Debug, Clone)]
pub struct Movement {
    pub log_type: InventoryLogType,
    /// Magnitude for IN/OUT/DAMAGE/RETURN, absolute count for ADJUSTMENT/STOCK_TAKE
    pub quantity: i64,
    pub reason: Option<String>,
    pub reference_type: ReferenceType,
    pub reference_id: Option<i64>,
    pub actor_id: Option<i64>,
}

impl Movement {
    /// Movement caused by an order
    pub fn for_order(
        log_type: InventoryLogType,
        quantity: i64,
        order_id: i64,
        reason: String,
        actor_id: Option<i64>,
    ) -> Self {
        Self {
            log_type,
            quantity,
            reason: Some(reason),
            reference_type: ReferenceType::Order,
            reference_id: Some(order_id),
            actor_id,
        }
    }
}

/// A committed-to-be stock change
#[derive(Debug, Clone)]
pub struct StockChange {
    pub log: InventoryLog,
    pub product_name: String,
    pub low_stock_alert: i64,
}

impl StockChange {
    /// Low-stock event when this change decreased stock to or below the threshold
    pub fn low_stock_event(&self) -> Option<PosEvent> {
        let decreased = self.log.current_stock < self.log.previous_stock;
        (decreased && self.log.current_stock <= self.low_stock_alert).then(|| PosEvent::LowStock {
            product_id: self.log.product_id,
            product_name: self.product_name.clone(),
            quantity: self.log.current_stock,
            threshold: self.low_stock_alert,
        })
    }
}

/// Stock after the movement and the logged magnitude
fn next_stock(previous: i64, log_type: InventoryLogType, quantity: i64) -> (i64, i64) {
    match log_type.direction() {
        1 => (previous + quantity, quantity),
        -1 => (previous - quantity, quantity),
        _ => (quantity, (quantity - previous).abs()),
    }
}

/// Apply one movement to one product inside an open transaction
///
/// Returns `None` for products with `track_inventory = false`, which are
/// never mutated.
pub async fn apply_movement(
    conn: &mut SqliteConnection,
    product_id: i64,
    movement: &Movement,
    policy: StockPolicy,
    now: i64,
) -> PipelineResult<Option<StockChange>> {
    if movement.quantity < 0 {
        return Err(PipelineError::ValidationFailed(format!(
            "movement quantity must not be negative, got {}",
            movement.quantity
        )));
    }

    let stock = product_repo::lock_stock(&mut *conn, product_id, now)
        .await?
        .ok_or_else(|| PipelineError::product_not_found(product_id))?;

    if !stock.track_inventory {
        return Ok(None);
    }

    let (current, magnitude) = next_stock(stock.quantity, movement.log_type, movement.quantity);
    if current < 0 {
        match policy {
            StockPolicy::Strict => {
                return Err(PipelineError::InsufficientStock {
                    product_id,
                    available: stock.quantity,
                    requested: movement.quantity,
                });
            }
            StockPolicy::AllowOversell => {
                tracing::warn!(
                    product_id,
                    available = stock.quantity,
                    requested = movement.quantity,
                    "Stock oversold, quantity goes negative"
                );
            }
        }
    }

    product_repo::set_quantity(&mut *conn, product_id, current, now).await?;
    let log = log_repo::insert(
        &mut *conn,
        &log_repo::NewInventoryLog {
            product_id,
            log_type: movement.log_type,
            quantity: magnitude,
            previous_stock: stock.quantity,
            current_stock: current,
            reason: movement.reason.clone(),
            reference_type: Some(movement.reference_type),
            reference_id: movement.reference_id,
            actor_id: movement.actor_id,
        },
        now,
    )
    .await?;

    tracing::debug!(
        product_id,
        log_type = movement.log_type.as_str(),
        previous = stock.quantity,
        current,
        "Stock movement applied"
    );

    Ok(Some(StockChange {
        log,
        product_name: stock.name,
        low_stock_alert: stock.low_stock_alert,
    }))
}
