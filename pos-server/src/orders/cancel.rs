//! Cancellation, refund and the general status update
//!
//! Cancelling a settled order restores stock with IN ledger rows in the same
//! transaction as the status write. Cancelling an unpaid order is a pure
//! status write that also closes any open gateway attempt.

use shared::models::{Order, OrderStatus, PaymentStatus};
use shared::util::now_millis;

use super::stock::restore_for_order;
use super::{
    Actor, CancelOrderRequest, OrdersManager, PipelineError, PipelineResult, UpdateStatusRequest,
    status,
};
use crate::db::repository::order as order_repo;
use crate::db::repository::payment::{self as payment_repo, AttemptUpdate};
use crate::notify::PosEvent;

/// Attempts before a cancel racing other writers gives up
const CANCEL_ATTEMPTS: usize = 3;

impl OrdersManager {
    /// Cancel an order, restoring stock if it was already decremented
    ///
    /// Re-cancelling a cancelled order succeeds without writing anything.
    pub async fn cancel_order(
        &self,
        order_id: i64,
        request: CancelOrderRequest,
        actor: &Actor,
    ) -> PipelineResult<Order> {
        let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());

        for attempt in 1..=CANCEL_ATTEMPTS {
            let order = self.load_order(order_id).await?;
            if order.status == OrderStatus::Cancelled {
                tracing::debug!(order_id, "Order already cancelled");
                return self.get_order(order_id).await;
            }
            if order.status.is_terminal() {
                return Err(PipelineError::InvalidTransition {
                    from: order.status,
                    to: OrderStatus::Cancelled,
                });
            }

            let now = now_millis();
            let mut tx = self.pool.begin().await?;
            if !order_repo::mark_cancelled(&mut *tx, order_id, order.status, reason, now).await? {
                // Status moved under us; drop the transaction and look again
                tracing::debug!(order_id, attempt, observed = %order.status, "Cancel lost a race, retrying");
                continue;
            }

            let restocked = if order.status.is_settled() {
                restore_for_order(&mut *tx, &order, Some(actor.id), now).await?
            } else {
                payment_repo::resolve_open_attempts(
                    &mut *tx,
                    order_id,
                    None,
                    &AttemptUpdate {
                        status: PaymentStatus::Failed,
                        gateway_transaction_id: None,
                        gateway_response: None,
                        notes: Some("Order cancelled"),
                        now,
                    },
                )
                .await?;
                Vec::new()
            };
            tx.commit().await?;

            tracing::info!(
                order_id,
                order_number = %order.order_number,
                from = %order.status,
                restocked_lines = restocked.len(),
                actor_id = actor.id,
                "Order cancelled"
            );
            self.emit(PosEvent::OrderStatusChanged {
                order_id,
                from: order.status,
                to: OrderStatus::Cancelled,
            });
            return self.get_order(order_id).await;
        }

        tracing::error!(order_id, "Cancel kept losing races with concurrent writers");
        Err(PipelineError::TransactionFailed(format!(
            "order {order_id} changed concurrently during cancellation"
        )))
    }

    /// Mark a settled order and its completed payment as refunded
    ///
    /// Stock is not restored: goods handed out stay out.
    pub async fn refund_order(&self, order_id: i64, actor: &Actor) -> PipelineResult<Order> {
        let order = self.load_order(order_id).await?;
        if order.status == OrderStatus::Refunded {
            return self.get_order(order_id).await;
        }
        status::check_transition(order.status, OrderStatus::Refunded)?;
        if !order.status.is_settled() {
            return Err(PipelineError::ValidationFailed(format!(
                "order in status {} has no payment to refund",
                order.status
            )));
        }

        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        if !order_repo::mark_refunded(&mut *tx, order_id, order.status, now).await? {
            let current = order_repo::find_by_id(&mut *tx, order_id)
                .await?
                .ok_or_else(|| PipelineError::order_not_found(order_id))?;
            return Err(PipelineError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Refunded,
            });
        }
        let refunded = payment_repo::refund_completed(&mut *tx, order_id, now).await?;
        tx.commit().await?;

        tracing::info!(order_id, from = %order.status, refunded, actor_id = actor.id, "Order refunded");
        self.emit(PosEvent::OrderStatusChanged {
            order_id,
            from: order.status,
            to: OrderStatus::Refunded,
        });
        self.get_order(order_id).await
    }

    /// General status update
    ///
    /// CANCELLED and REFUNDED are delegated; PAID only comes from settlement.
    pub async fn update_status(
        &self,
        order_id: i64,
        request: UpdateStatusRequest,
        actor: &Actor,
    ) -> PipelineResult<Order> {
        match request.status {
            OrderStatus::Cancelled => {
                return self
                    .cancel_order(
                        order_id,
                        CancelOrderRequest {
                            reason: request.reason,
                        },
                        actor,
                    )
                    .await;
            }
            OrderStatus::Refunded => return self.refund_order(order_id, actor).await,
            _ => {}
        }

        let order = self.load_order(order_id).await?;
        let target = request.status;
        if !status::check_transition(order.status, target)? {
            return self.get_order(order_id).await;
        }
        if target == OrderStatus::Paid {
            return Err(PipelineError::InvalidTransition {
                from: order.status,
                to: target,
            });
        }

        let now = now_millis();
        if !order_repo::transition(&self.pool, order_id, order.status, target, now).await? {
            let current = self.load_order(order_id).await?;
            if current.status == target {
                return self.get_order(order_id).await;
            }
            return Err(PipelineError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }

        tracing::info!(order_id, from = %order.status, to = %target, actor_id = actor.id, "Order status updated");
        self.emit(PosEvent::OrderStatusChanged {
            order_id,
            from: order.status,
            to: target,
        });
        self.get_order(order_id).await
    }
}
