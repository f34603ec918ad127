//! Gateway path of the orchestrator
//!
//! Token issuance, retries, status resolution and webhook handling. Every
//! outcome goes through [`OrdersManager::apply_gateway_status`], so a poll
//! and a webhook reporting the same settlement decrement stock once.

use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use shared::util::now_millis;

use super::gateway::{GatewayError, GatewayOutcome, GatewayTransactionStatus};
use super::request::build_transaction_request;
use super::signature::verify_signature;
use crate::db::repository::order::{self as order_repo, CloseUnpaid, GatewaySession};
use crate::db::repository::payment::{self as payment_repo, AttemptUpdate, NewPayment};
use crate::inventory::StockPolicy;
use crate::notify::PosEvent;
use crate::orders::{Actor, OrdersManager, PipelineError, PipelineResult, stock};

const LATE_CAPTURE_NOTE: &str = "Captured after the order was paid and cancelled, manual refund required";

/// Token handed to the client for the hosted checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCheckout {
    pub order_id: i64,
    pub gateway_order_id: String,
    pub token: String,
    pub redirect_url: String,
    pub issued_at: i64,
    pub expires_at: i64,
    /// An unexpired token was returned instead of asking the gateway again
    pub reused: bool,
}

/// Asynchronous status notification pushed by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl From<&GatewayNotification> for GatewayTransactionStatus {
    fn from(n: &GatewayNotification) -> Self {
        Self {
            order_id: n.order_id.clone(),
            transaction_status: n.transaction_status.clone(),
            fraud_status: n.fraud_status.clone(),
            transaction_id: n.transaction_id.clone(),
            status_code: Some(n.status_code.clone()),
            gross_amount: Some(n.gross_amount.clone()),
            payment_type: n.payment_type.clone(),
        }
    }
}

/// Whether a gateway checkout may be started for an order in this status
fn check_checkout_allowed(order: &Order) -> PipelineResult<()> {
    match order.status {
        OrderStatus::Draft | OrderStatus::PendingPayment => Ok(()),
        OrderStatus::Cancelled => Err(PipelineError::OrderCancelled { order_id: order.id }),
        status => Err(PipelineError::AlreadyPaid { status }),
    }
}

/// Preconditions of a retry
fn check_retry_allowed(order: &Order, failed_attempts: i64, max_retries: i64) -> PipelineResult<()> {
    match order.status {
        OrderStatus::PendingPayment => {}
        OrderStatus::Cancelled => {
            // Only a cancellation caused by the gateway itself can be reopened
            let closed_by_gateway = matches!(
                order.payment_status,
                PaymentStatus::Failed | PaymentStatus::Expired
            );
            if order.paid_at.is_some() || !closed_by_gateway {
                return Err(PipelineError::OrderCancelled { order_id: order.id });
            }
        }
        OrderStatus::Draft => {
            return Err(PipelineError::ValidationFailed(
                "order has no gateway transaction to retry".into(),
            ));
        }
        status => return Err(PipelineError::AlreadyPaid { status }),
    }
    if !order.payment_status.is_retryable() {
        return Err(PipelineError::ValidationFailed(format!(
            "payment status {} cannot be retried",
            order.payment_status
        )));
    }
    if order.gateway_order_id.is_none() {
        return Err(PipelineError::ValidationFailed(
            "order has no gateway transaction to retry".into(),
        ));
    }
    if failed_attempts >= max_retries {
        return Err(PipelineError::MaxRetriesExceeded {
            attempts: failed_attempts,
            max: max_retries,
        });
    }
    Ok(())
}

/// Correlation id of attempt `n` (0 = first)
pub fn gateway_order_id(order_number: &str, attempt: i64) -> String {
    if attempt == 0 {
        order_number.to_string()
    } else {
        format!("{order_number}-R{attempt}")
    }
}

impl OrdersManager {
    fn checkout_from(&self, order: &Order, reused: bool) -> Option<GatewayCheckout> {
        let issued_at = order.token_issued_at?;
        Some(GatewayCheckout {
            order_id: order.id,
            gateway_order_id: order.gateway_order_id.clone()?,
            token: order.payment_token.clone()?,
            redirect_url: order.payment_redirect_url.clone().unwrap_or_default(),
            issued_at,
            expires_at: issued_at.saturating_add(self.settings.token_expiry_millis()),
            reused,
        })
    }

    fn expiry_minutes(&self) -> i64 {
        (self.settings.token_expiry_millis() / 60_000).max(1)
    }

    /// Issue a gateway token for an order, or return the live one
    pub async fn create_gateway_transaction(
        &self,
        order_id: i64,
        actor: &Actor,
    ) -> PipelineResult<GatewayCheckout> {
        let order = self.get_order(order_id).await?;
        check_checkout_allowed(&order)?;

        if let Some(issued_at) = order.token_issued_at
            && order.payment_token.is_some()
        {
            if self.settings.is_token_expired(issued_at, now_millis()) {
                return Err(PipelineError::TokenExpired { order_id });
            }
            if let Some(checkout) = self.checkout_from(&order, true) {
                tracing::debug!(order_id, "Reusing live gateway token");
                return Ok(checkout);
            }
        }

        let gateway_order_id = gateway_order_id(&order.order_number, 0);
        let request = build_transaction_request(
            &order,
            &gateway_order_id,
            self.expiry_minutes(),
            self.settings.finish_url.as_deref(),
        );
        let token = match self.gateway.create_transaction(&request).await {
            Ok(token) => token,
            Err(GatewayError::Duplicate(id)) => {
                // A concurrent request may have stored the token already
                let current = self.load_order(order_id).await?;
                return self
                    .checkout_from(&current, true)
                    .ok_or(PipelineError::DuplicateTransaction(id));
            }
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Gateway transaction creation failed");
                return Err(e.into());
            }
        };

        let now = now_millis();
        let session = GatewaySession {
            order_id,
            token: &token.token,
            redirect_url: &token.redirect_url,
            gateway_order_id: &gateway_order_id,
            now,
        };
        let mut tx = self.pool.begin().await?;
        if !order_repo::set_gateway_session(&mut *tx, &session).await? {
            let current = order_repo::find_by_id(&mut *tx, order_id)
                .await?
                .ok_or_else(|| PipelineError::order_not_found(order_id))?;
            drop(tx);
            check_checkout_allowed(&current)?;
            return self
                .checkout_from(&current, true)
                .ok_or_else(|| PipelineError::TransactionFailed("gateway session not stored".into()));
        }
        let mut payment = NewPayment::new(
            order_id,
            PaymentMethod::Gateway,
            order.total_amount,
            PaymentStatus::Pending,
        );
        payment.gateway_name = Some(self.gateway.name().to_string());
        payment.reference_number = Some(gateway_order_id.clone());
        payment_repo::insert(&mut *tx, &payment, now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            gateway_order_id = %gateway_order_id,
            gross_amount = request.transaction_details.gross_amount,
            actor_id = actor.id,
            "Gateway transaction created"
        );
        if order.status == OrderStatus::Draft {
            self.emit(PosEvent::OrderStatusChanged {
                order_id,
                from: order.status,
                to: OrderStatus::PendingPayment,
            });
        }

        Ok(GatewayCheckout {
            order_id,
            gateway_order_id,
            token: token.token,
            redirect_url: token.redirect_url,
            issued_at: now,
            expires_at: now.saturating_add(self.settings.token_expiry_millis()),
            reused: false,
        })
    }

    /// Start a new gateway attempt under a fresh correlation id
    pub async fn retry_gateway_transaction(
        &self,
        order_id: i64,
        actor: &Actor,
    ) -> PipelineResult<GatewayCheckout> {
        let order = self.get_order(order_id).await?;
        let failed_attempts = payment_repo::count_by_statuses(
            &self.pool,
            order_id,
            &[PaymentStatus::Failed, PaymentStatus::Expired],
        )
        .await?;
        check_retry_allowed(&order, failed_attempts, self.settings.max_gateway_retries)?;

        let attempt = payment_repo::count_gateway_attempts(&self.pool, order_id).await?.max(1);
        let gateway_order_id = gateway_order_id(&order.order_number, attempt);
        let request = build_transaction_request(
            &order,
            &gateway_order_id,
            self.expiry_minutes(),
            self.settings.finish_url.as_deref(),
        );
        let token = self.gateway.create_transaction(&request).await.inspect_err(|e| {
            tracing::warn!(order_id, gateway_order_id = %gateway_order_id, error = %e, "Gateway retry failed");
        })?;

        let now = now_millis();
        let session = GatewaySession {
            order_id,
            token: &token.token,
            redirect_url: &token.redirect_url,
            gateway_order_id: &gateway_order_id,
            now,
        };
        let mut tx = self.pool.begin().await?;
        let replaced = order_repo::replace_gateway_session(
            &mut *tx,
            &session,
            order.status,
            order.payment_status,
            order.gateway_order_id.as_deref(),
        )
        .await?;
        if !replaced {
            let current = order_repo::find_by_id(&mut *tx, order_id)
                .await?
                .ok_or_else(|| PipelineError::order_not_found(order_id))?;
            tracing::warn!(order_id, status = %current.status, "Gateway retry lost a race");
            if current.status.is_settled() {
                return Err(PipelineError::AlreadyPaid {
                    status: current.status,
                });
            }
            return Err(PipelineError::TransactionFailed(format!(
                "order {order_id} changed concurrently during retry"
            )));
        }

        let superseded = payment_repo::resolve_open_attempts(
            &mut *tx,
            order_id,
            None,
            &AttemptUpdate {
                status: PaymentStatus::Failed,
                gateway_transaction_id: None,
                gateway_response: None,
                notes: Some("Superseded by retry"),
                now,
            },
        )
        .await?;
        let mut payment = NewPayment::new(
            order_id,
            PaymentMethod::Gateway,
            order.total_amount,
            PaymentStatus::Pending,
        );
        payment.gateway_name = Some(self.gateway.name().to_string());
        payment.reference_number = Some(gateway_order_id.clone());
        payment_repo::insert(&mut *tx, &payment, now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            gateway_order_id = %gateway_order_id,
            attempt,
            superseded,
            reopened = order.status == OrderStatus::Cancelled,
            actor_id = actor.id,
            "Gateway transaction retried"
        );
        if order.status == OrderStatus::Cancelled {
            self.emit(PosEvent::OrderStatusChanged {
                order_id,
                from: OrderStatus::Cancelled,
                to: OrderStatus::PendingPayment,
            });
        }

        Ok(GatewayCheckout {
            order_id,
            gateway_order_id,
            token: token.token,
            redirect_url: token.redirect_url,
            issued_at: now,
            expires_at: now.saturating_add(self.settings.token_expiry_millis()),
            reused: false,
        })
    }

    /// Poll the gateway and apply what it reports
    ///
    /// A timeout leaves the order untouched. A transaction the gateway does
    /// not know, behind an expired token, is expired locally.
    pub async fn check_gateway_status(&self, order_id: i64) -> PipelineResult<Order> {
        let order = self.load_order(order_id).await?;
        let Some(gateway_order_id) = order.gateway_order_id.clone() else {
            return Err(PipelineError::ValidationFailed(
                "order has no gateway transaction".into(),
            ));
        };

        match self.gateway.transaction_status(&gateway_order_id).await {
            Ok(status) => {
                let raw = serde_json::to_string(&status).ok();
                self.apply_gateway_status(order_id, &status, raw.as_deref()).await
            }
            Err(GatewayError::NotFound(_)) => {
                let now = now_millis();
                let expired = order
                    .token_issued_at
                    .is_some_and(|issued| self.settings.is_token_expired(issued, now));
                if expired {
                    tracing::info!(order_id, gateway_order_id = %gateway_order_id, "Gateway has no transaction and token expired, expiring locally");
                    self.expire_payment(order_id, now).await?;
                } else {
                    tracing::debug!(order_id, "Gateway has no transaction yet");
                }
                self.get_order(order_id).await
            }
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Gateway status check failed, order left unchanged");
                Err(e.into())
            }
        }
    }

    /// Verify and apply a gateway push notification
    ///
    /// Redelivery of an already applied `(order id, status, fraud status)`
    /// triple returns the current order without touching it.
    pub async fn handle_gateway_notification(
        &self,
        notification: &GatewayNotification,
        raw: &str,
        server_key: &str,
    ) -> PipelineResult<Order> {
        if !verify_signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            server_key,
            &notification.signature_key,
        ) {
            tracing::warn!(gateway_order_id = %notification.order_id, "Gateway notification with invalid signature");
            return Err(PipelineError::InvalidSignature);
        }

        let order_id = order_repo::find_id_by_gateway_reference(&self.pool, &notification.order_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound {
                resource: "Gateway order",
                id: notification.order_id.clone(),
            })?;

        if payment_repo::notification_seen(
            &self.pool,
            &notification.order_id,
            &notification.transaction_status,
            notification.fraud_status.as_deref(),
        )
        .await?
        {
            tracing::debug!(order_id, gateway_order_id = %notification.order_id, status = %notification.transaction_status, fraud_status = ?notification.fraud_status, "Duplicate gateway notification");
            return self.get_order(order_id).await;
        }

        let status = GatewayTransactionStatus::from(notification);
        let order = self.apply_gateway_status(order_id, &status, Some(raw)).await?;

        // Recorded after applying, so a failed apply is retried on redelivery
        payment_repo::record_notification(
            &self.pool,
            &notification.order_id,
            &notification.transaction_status,
            notification.fraud_status.as_deref(),
            &notification.status_code,
            raw,
            now_millis(),
        )
        .await?;
        Ok(order)
    }

    /// Map a gateway status onto the order and apply it atomically
    pub(crate) async fn apply_gateway_status(
        &self,
        order_id: i64,
        status: &GatewayTransactionStatus,
        raw: Option<&str>,
    ) -> PipelineResult<Order> {
        let outcome = status.outcome();
        let order = self.load_order(order_id).await?;
        let reference = status.order_id.as_str();
        let current_attempt = order.gateway_order_id.as_deref() == Some(reference);

        tracing::debug!(
            order_id,
            gateway_order_id = %reference,
            transaction_status = %status.transaction_status,
            fraud_status = ?status.fraud_status,
            ?outcome,
            current_attempt,
            "Applying gateway status"
        );

        match outcome {
            GatewayOutcome::Settled => self.settle_from_gateway(&order, status, raw).await?,
            // Only the live attempt may move an unsettled order
            _ if !current_attempt => {
                tracing::info!(order_id, gateway_order_id = %reference, ?outcome, "Ignoring status of superseded gateway attempt");
            }
            GatewayOutcome::Challenged => self.hold_for_review(&order, status, raw).await?,
            GatewayOutcome::Failed => {
                self.close_from_gateway(&order, status, raw, PaymentStatus::Failed)
                    .await?
            }
            GatewayOutcome::Expired => {
                self.close_from_gateway(&order, status, raw, PaymentStatus::Expired)
                    .await?
            }
            GatewayOutcome::Refunded => {
                if order.status.is_settled() {
                    self.refund_order(order_id, &Actor::system()).await?;
                } else {
                    tracing::warn!(order_id, status = %order.status, "Gateway refund for an order that is not settled");
                }
            }
            GatewayOutcome::Pending => {}
            GatewayOutcome::Unknown => {
                tracing::warn!(order_id, transaction_status = %status.transaction_status, "Unknown gateway transaction status");
            }
        }

        self.get_order(order_id).await
    }

    async fn settle_from_gateway(
        &self,
        order: &Order,
        status: &GatewayTransactionStatus,
        raw: Option<&str>,
    ) -> PipelineResult<()> {
        let order_id = order.id;
        // Already settled: a second poll or redelivered webhook is a no-op
        if !order.status.is_settleable() && order.status != OrderStatus::Cancelled {
            tracing::debug!(order_id, status = %order.status, "Settlement already applied");
            return Ok(());
        }

        let now = now_millis();
        let reference = status.order_id.as_str();
        let mut tx = self.pool.begin().await?;

        let paid = order_repo::mark_paid(
            &mut *tx,
            order_id,
            order.total_amount,
            0.0,
            PaymentMethod::Gateway,
            now,
        )
        .await?;
        if !paid {
            let current = order_repo::find_by_id(&mut *tx, order_id)
                .await?
                .ok_or_else(|| PipelineError::order_not_found(order_id))?;
            if current.status != OrderStatus::Cancelled {
                tracing::debug!(order_id, status = %current.status, "Settlement applied concurrently");
                return Ok(());
            }
            // Money was captured for an order that is already closed. If it was
            // also paid another way, the capture is noted on the attempt instead
            // of becoming a second COMPLETED row.
            let already_paid =
                payment_repo::count_by_statuses(&mut *tx, order_id, &[PaymentStatus::Completed])
                    .await?
                    > 0;
            let recorded = if already_paid {
                payment_repo::note_late_capture(
                    &mut *tx,
                    order_id,
                    reference,
                    &AttemptUpdate {
                        status: PaymentStatus::Processing,
                        gateway_transaction_id: status.transaction_id.as_deref(),
                        gateway_response: raw,
                        notes: Some(LATE_CAPTURE_NOTE),
                        now,
                    },
                )
                .await?
            } else {
                payment_repo::complete_gateway_attempt(
                    &mut *tx,
                    order_id,
                    reference,
                    status.transaction_id.as_deref(),
                    raw,
                    now,
                )
                .await?
            };
            tx.commit().await?;
            tracing::warn!(
                order_id,
                gateway_order_id = %reference,
                recorded,
                already_paid,
                "Gateway settled a cancelled order, manual refund required"
            );
            return Ok(());
        }

        let completed = payment_repo::complete_gateway_attempt(
            &mut *tx,
            order_id,
            reference,
            status.transaction_id.as_deref(),
            raw,
            now,
        )
        .await?;
        if completed == 0 {
            let mut payment = NewPayment::new(
                order_id,
                PaymentMethod::Gateway,
                order.total_amount,
                PaymentStatus::Completed,
            );
            payment.gateway_name = Some(self.gateway.name().to_string());
            payment.gateway_transaction_id = status.transaction_id.clone();
            payment.reference_number = Some(reference.to_string());
            payment.gateway_response = raw.map(str::to_string);
            payment.paid_at = Some(now);
            payment_repo::insert(&mut *tx, &payment, now).await?;
        }
        payment_repo::resolve_open_attempts(
            &mut *tx,
            order_id,
            None,
            &AttemptUpdate {
                status: PaymentStatus::Failed,
                gateway_transaction_id: None,
                gateway_response: None,
                notes: Some("Superseded by settled attempt"),
                now,
            },
        )
        .await?;

        // The customer has paid; stock may go negative rather than refuse
        let changes =
            stock::decrement_for_order(&mut *tx, order, StockPolicy::AllowOversell, None, now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            order_number = %order.order_number,
            gateway_order_id = %reference,
            transaction_id = ?status.transaction_id,
            stock_moves = changes.len(),
            "Gateway payment settled"
        );
        self.emit(PosEvent::OrderStatusChanged {
            order_id,
            from: order.status,
            to: OrderStatus::Paid,
        });
        self.emit(PosEvent::PaymentConfirmed {
            order_id,
            amount: order.total_amount,
            method: PaymentMethod::Gateway,
        });
        self.emit_low_stock(&changes);
        Ok(())
    }

    async fn hold_for_review(
        &self,
        order: &Order,
        status: &GatewayTransactionStatus,
        raw: Option<&str>,
    ) -> PipelineResult<()> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        if !order_repo::mark_awaiting_confirmation(&mut *tx, order.id, now).await? {
            return Ok(());
        }
        payment_repo::resolve_open_attempts(
            &mut *tx,
            order.id,
            Some(&status.order_id),
            &AttemptUpdate {
                status: PaymentStatus::Processing,
                gateway_transaction_id: status.transaction_id.as_deref(),
                gateway_response: raw,
                notes: Some("Held for fraud review"),
                now,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = order.id, "Gateway payment held for review");
        self.emit(PosEvent::OrderStatusChanged {
            order_id: order.id,
            from: order.status,
            to: OrderStatus::AwaitingConfirmation,
        });
        Ok(())
    }

    async fn close_from_gateway(
        &self,
        order: &Order,
        status: &GatewayTransactionStatus,
        raw: Option<&str>,
        payment_status: PaymentStatus,
    ) -> PipelineResult<()> {
        let reason = if payment_status == PaymentStatus::Expired {
            "Payment expired at gateway"
        } else {
            "Payment failed at gateway"
        };
        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        let closed = order_repo::close_unpaid(
            &mut *tx,
            &CloseUnpaid {
                order_id: order.id,
                payment_status,
                reason,
                now,
                from: &OrderStatus::SETTLEABLE,
                from_payment: &[],
                issued_at_or_before: None,
            },
        )
        .await?;
        if !closed {
            tracing::debug!(order_id = order.id, status = %order.status, "Gateway failure for an order no longer open");
            return Ok(());
        }
        payment_repo::resolve_open_attempts(
            &mut *tx,
            order.id,
            Some(&status.order_id),
            &AttemptUpdate {
                status: payment_status,
                gateway_transaction_id: status.transaction_id.as_deref(),
                gateway_response: raw,
                notes: Some(reason),
                now,
            },
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = order.id, payment_status = %payment_status, "Order closed by gateway outcome");
        self.emit(PosEvent::OrderStatusChanged {
            order_id: order.id,
            from: order.status,
            to: OrderStatus::Cancelled,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_order_id_suffix() {
        assert_eq!(gateway_order_id("ORD20240101123", 0), "ORD20240101123");
        assert_eq!(gateway_order_id("ORD20240101123", 1), "ORD20240101123-R1");
        assert_eq!(gateway_order_id("ORD20240101123", 12), "ORD20240101123-R12");
    }

    #[test]
    fn test_notification_converts_to_status() {
        let n = GatewayNotification {
            order_id: "ORD-1-R2".into(),
            status_code: "200".into(),
            gross_amount: "25000.00".into(),
            signature_key: "x".into(),
            transaction_status: "settlement".into(),
            fraud_status: Some("accept".into()),
            transaction_id: Some("tx-9".into()),
            payment_type: Some("qris".into()),
        };
        let status = GatewayTransactionStatus::from(&n);
        assert_eq!(status.outcome(), GatewayOutcome::Settled);
        assert_eq!(status.order_id, "ORD-1-R2");
    }
}
