use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::models::{InventoryLog, InventoryLogType, ReferenceType};
use shared::util::now_millis;
use sqlx::SqlitePool;
use validator::Validate;

use super::{Movement, StockPolicy, apply_movement};
use crate::db::repository::{inventory as log_repo, product as product_repo};
use crate::notify::OrderNotifier;
use crate::orders::{Actor, PipelineError, PipelineResult};

/// Manual ledger entry (restock, damage, stock take)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustStockRequest {
    pub log_type: InventoryLogType,
    /// Magnitude, or the counted stock for ADJUSTMENT/STOCK_TAKE
    #[validate(range(min = 0))]
    pub quantity: i64,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

/// Result of a ledger consistency check for one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerCheck {
    pub product_id: i64,
    pub quantity: i64,
    pub latest_log_stock: Option<i64>,
    pub consistent: bool,
}

/// Manual stock operations and ledger queries
#[derive(Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
    notifier: Arc<dyn OrderNotifier>,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn OrderNotifier>) -> Self {
        Self { pool, notifier }
    }

    /// Append a manual movement in its own transaction
    pub async fn adjust_stock(
        &self,
        product_id: i64,
        request: AdjustStockRequest,
        actor: &Actor,
    ) -> PipelineResult<InventoryLog> {
        let product = product_repo::find_by_id(&self.pool, product_id)
            .await?
            .ok_or_else(|| PipelineError::product_not_found(product_id))?;
        if !product.track_inventory {
            return Err(PipelineError::ValidationFailed(format!(
                "product {product_id} does not track inventory"
            )));
        }
        let decreases = request.log_type.direction() < 0;
        if decreases && request.quantity == 0 {
            return Err(PipelineError::ValidationFailed(
                "quantity must be positive".into(),
            ));
        }

        let movement = Movement {
            log_type: request.log_type,
            quantity: request.quantity,
            reason: request.reason,
            reference_type: ReferenceType::Manual,
            reference_id: None,
            actor_id: Some(actor.id),
        };

        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        let change = apply_movement(&mut *tx, product_id, &movement, StockPolicy::Strict, now)
            .await?
            .ok_or_else(|| {
                PipelineError::TransactionFailed("inventory tracking changed concurrently".into())
            })?;
        tx.commit().await?;

        tracing::info!(
            product_id,
            log_type = change.log.log_type.as_str(),
            previous = change.log.previous_stock,
            current = change.log.current_stock,
            actor_id = actor.id,
            "Manual stock adjustment"
        );
        if let Some(event) = change.low_stock_event() {
            self.notifier.notify(event);
        }
        Ok(change.log)
    }

    /// Product quantity must equal the latest ledger row
    pub async fn verify_ledger(&self, product_id: i64) -> PipelineResult<LedgerCheck> {
        let product = product_repo::find_by_id(&self.pool, product_id)
            .await?
            .ok_or_else(|| PipelineError::product_not_found(product_id))?;
        let latest = log_repo::find_latest(&self.pool, product_id).await?;
        let latest_log_stock = latest.map(|log| log.current_stock);
        let consistent = latest_log_stock.is_none_or(|stock| stock == product.quantity);
        if !consistent {
            tracing::error!(
                product_id,
                quantity = product.quantity,
                ?latest_log_stock,
                "Inventory ledger out of sync with product quantity"
            );
        }
        Ok(LedgerCheck {
            product_id,
            quantity: product.quantity,
            latest_log_stock,
            consistent,
        })
    }

    pub async fn list_logs(&self, product_id: i64) -> PipelineResult<Vec<InventoryLog>> {
        product_repo::find_by_id(&self.pool, product_id)
            .await?
            .ok_or_else(|| PipelineError::product_not_found(product_id))?;
        Ok(log_repo::find_by_product(&self.pool, product_id).await?)
    }
}
