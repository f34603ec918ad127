//! Cash path settlement
//!
//! One transaction: order → PAID, one COMPLETED payment row, one OUT ledger
//! row per tracked line. A failure on any line rolls back all of it.

use shared::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use shared::util::now_millis;

use super::money;
use super::stock::decrement_for_order;
use super::{Actor, ConfirmPaymentRequest, OrdersManager, PipelineError, PipelineResult};
use crate::db::repository::order as order_repo;
use crate::db::repository::payment::{self as payment_repo, AttemptUpdate, NewPayment};
use crate::inventory::StockPolicy;
use crate::notify::PosEvent;

/// Error for an order that can no longer take a payment
pub(crate) fn settlement_conflict(status: OrderStatus) -> PipelineError {
    if status.is_settled() {
        PipelineError::OrderAlreadySettled { status }
    } else {
        PipelineError::OrderNotSettleable { status }
    }
}

fn resolve_method(requested: Option<PaymentMethod>, order: &Order) -> PipelineResult<PaymentMethod> {
    let method = requested
        .or(order.payment_method.filter(PaymentMethod::is_manual))
        .unwrap_or(PaymentMethod::Cash);
    if !method.is_manual() {
        return Err(PipelineError::ValidationFailed(
            "gateway payments are settled through the gateway status check".into(),
        ));
    }
    Ok(method)
}

impl OrdersManager {
    pub async fn confirm_payment(
        &self,
        order_id: i64,
        request: ConfirmPaymentRequest,
        actor: &Actor,
    ) -> PipelineResult<Order> {
        let order = self.load_order(order_id).await?;
        if !order.status.is_settleable() {
            return Err(settlement_conflict(order.status));
        }

        if let Some(short) = money::shortage(order.total_amount, request.paid_amount) {
            return Err(PipelineError::InsufficientPayment {
                total: order.total_amount,
                paid: request.paid_amount,
                shortage: money::to_f64(short),
            });
        }

        let method = resolve_method(request.payment_method, &order)?;
        let paid = money::to_decimal(request.paid_amount);
        let change = match request.change_amount {
            Some(change) => money::to_decimal(change),
            None => paid - money::to_decimal(order.total_amount),
        };
        if change > paid {
            return Err(PipelineError::ValidationFailed(format!(
                "change {change} exceeds paid amount {paid}"
            )));
        }
        let (paid_amount, change_amount) = (money::to_f64(paid), money::to_f64(change));

        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        // Guarded write first: a racing confirm or sweep waits here, then
        // finds the status moved and falls into the branch below
        if !order_repo::mark_paid(&mut *tx, order_id, paid_amount, change_amount, method, now).await? {
            let current = order_repo::find_by_id(&mut *tx, order_id)
                .await?
                .ok_or_else(|| PipelineError::order_not_found(order_id))?;
            tracing::warn!(order_id, status = %current.status, "Payment confirmation lost the race");
            return Err(settlement_conflict(current.status));
        }

        // A pending gateway checkout is abandoned once cash is taken
        let superseded = payment_repo::resolve_open_attempts(
            &mut *tx,
            order_id,
            None,
            &AttemptUpdate {
                status: PaymentStatus::Failed,
                gateway_transaction_id: None,
                gateway_response: None,
                notes: Some("Superseded by manual payment"),
                now,
            },
        )
        .await?;

        let mut payment = NewPayment::new(order_id, method, order.total_amount, PaymentStatus::Completed);
        payment.reference_number = request.reference_number.clone();
        payment.verified_by = Some(actor.id);
        payment.verified_at = Some(now);
        payment.verification_notes = request.notes.clone();
        payment.paid_at = Some(now);
        match payment_repo::insert(&mut *tx, &payment, now).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate_on("payments.order_id") => {
                return Err(PipelineError::OrderAlreadySettled {
                    status: OrderStatus::Paid,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let changes = decrement_for_order(&mut *tx, &order, StockPolicy::Strict, Some(actor.id), now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            order_number = %order.order_number,
            method = method.as_str(),
            paid = paid_amount,
            change = change_amount,
            superseded,
            stock_moves = changes.len(),
            actor_id = actor.id,
            "Payment confirmed"
        );
        self.emit(PosEvent::OrderStatusChanged {
            order_id,
            from: order.status,
            to: OrderStatus::Paid,
        });
        self.emit(PosEvent::PaymentConfirmed {
            order_id,
            amount: order.total_amount,
            method,
        });
        self.emit_low_stock(&changes);

        self.get_order(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_conflict_kinds() {
        assert!(matches!(
            settlement_conflict(OrderStatus::Paid),
            PipelineError::OrderAlreadySettled { .. }
        ));
        assert!(matches!(
            settlement_conflict(OrderStatus::Completed),
            PipelineError::OrderAlreadySettled { .. }
        ));
        assert!(matches!(
            settlement_conflict(OrderStatus::Cancelled),
            PipelineError::OrderNotSettleable { .. }
        ));
        assert!(matches!(
            settlement_conflict(OrderStatus::Refunded),
            PipelineError::OrderNotSettleable { .. }
        ));
    }
}
