//! Order pipeline
//!
//! [`OrdersManager`] is the transaction orchestrator. Every operation that
//! touches more than one entity (order, payments, stock, ledger) runs as one
//! `sqlx` transaction: it commits at the end, and any `?` exit drops the
//! transaction, which rolls it back.
//!
//! Racing writers on the same order are serialised by SQLite's write lock.
//! Each unit of work starts with a guarded write (compare-and-set on the
//! order status), so the loser waits on `busy_timeout`, then sees the
//! winner's committed status and fails its precondition instead of
//! double-applying.

mod cancel;
mod confirm;
mod create;
pub mod error;
pub mod money;
pub mod status;
pub(crate) mod stock;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use types::{
    Actor, CancelOrderRequest, ConfirmPaymentRequest, CreateOrderRequest, OrderItemInput,
    UpdateStatusRequest,
};

use std::sync::Arc;
use std::time::Duration;

use shared::models::{Order, Payment};
use sqlx::SqlitePool;

use crate::db::repository::{order as order_repo, payment as payment_repo};
use crate::inventory::StockChange;
use crate::notify::{OrderNotifier, PosEvent};
use crate::payments::PaymentGateway;

/// Tunables of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Age at which a gateway token counts as expired
    pub token_expiry: Duration,
    /// Failed/expired gateway attempts allowed before retries are refused
    pub max_gateway_retries: i64,
    /// Where the gateway sends the customer after checkout
    pub finish_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            token_expiry: Duration::from_secs(10 * 60),
            max_gateway_retries: 5,
            finish_url: None,
        }
    }
}

impl PipelineSettings {
    pub fn token_expiry_millis(&self) -> i64 {
        i64::try_from(self.token_expiry.as_millis()).unwrap_or(i64::MAX)
    }

    /// `now - issued_at >= window`; the boundary instant is expired
    pub fn is_token_expired(&self, issued_at: i64, now: i64) -> bool {
        now.saturating_sub(issued_at) >= self.token_expiry_millis()
    }
}

/// Transaction orchestrator for orders, payments and stock
#[derive(Clone)]
pub struct OrdersManager {
    pub(crate) pool: SqlitePool,
    pub(crate) notifier: Arc<dyn OrderNotifier>,
    pub(crate) gateway: Arc<dyn PaymentGateway>,
    pub(crate) settings: PipelineSettings,
}

impl OrdersManager {
    pub fn new(
        pool: SqlitePool,
        notifier: Arc<dyn OrderNotifier>,
        gateway: Arc<dyn PaymentGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            pool,
            notifier,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Order with its lines; soft-deleted orders are not found
    pub async fn get_order(&self, order_id: i64) -> PipelineResult<Order> {
        let mut order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| PipelineError::order_not_found(order_id))?;
        order.items = order_repo::find_items(&self.pool, order_id).await?;
        Ok(order)
    }

    /// Payment attempts in attempt order
    pub async fn list_payments(&self, order_id: i64) -> PipelineResult<Vec<Payment>> {
        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| PipelineError::order_not_found(order_id))?;
        Ok(payment_repo::find_by_order(&self.pool, order_id).await?)
    }

    /// Hide a terminal order from all reporting and stock logic
    pub async fn soft_delete_order(&self, order_id: i64, actor: &Actor) -> PipelineResult<()> {
        let order = order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| PipelineError::order_not_found(order_id))?;
        if !order.status.is_terminal() {
            return Err(PipelineError::ValidationFailed(format!(
                "only completed, cancelled or refunded orders can be deleted (status {})",
                order.status
            )));
        }
        if !order_repo::soft_delete(&self.pool, order_id, shared::util::now_millis()).await? {
            return Err(PipelineError::order_not_found(order_id));
        }
        tracing::info!(order_id, actor_id = actor.id, "Order soft-deleted");
        Ok(())
    }

    /// Load a live order or fail with NotFound
    pub(crate) async fn load_order(&self, order_id: i64) -> PipelineResult<Order> {
        order_repo::find_by_id(&self.pool, order_id)
            .await?
            .ok_or_else(|| PipelineError::order_not_found(order_id))
    }

    pub(crate) fn emit(&self, event: PosEvent) {
        self.notifier.notify(event);
    }

    pub(crate) fn emit_low_stock(&self, changes: &[StockChange]) {
        for event in changes.iter().filter_map(StockChange::low_stock_event) {
            self.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_boundary_is_inclusive() {
        let settings = PipelineSettings::default();
        let issued = 1_000_000;
        let window = settings.token_expiry_millis();
        assert!(!settings.is_token_expired(issued, issued + window - 1));
        assert!(settings.is_token_expired(issued, issued + window));
        assert!(settings.is_token_expired(issued, issued + window + 1));
    }
}
