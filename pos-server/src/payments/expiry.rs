//! Expiry Sweeper
//!
//! Closes orders whose gateway token outlived the expiry window. Each order
//! is expired in its own transaction, so one failure never blocks the rest
//! of the batch. Stock is untouched: an unpaid order never decremented it.
//!
//! Registered as `TaskKind::Periodic` by the server.

use std::time::Duration;

use serde::Serialize;
use shared::models::{OrderStatus, PaymentMethod, PaymentStatus};
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::db::repository::order::{self as order_repo, CloseUnpaid};
use crate::db::repository::payment::{self as payment_repo, AttemptUpdate, NewPayment};
use crate::notify::PosEvent;
use crate::orders::{OrdersManager, PipelineResult};

const EXPIRY_REASON: &str = "Payment token expired";

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    /// Paid, cancelled or retried between the scan and the write
    pub skipped: usize,
    pub failed: usize,
}

impl OrdersManager {
    /// Expire every pending gateway payment whose token is at least one
    /// window old at `now`
    pub async fn sweep_expired_payments(&self, now: i64) -> PipelineResult<SweepReport> {
        let cutoff = now.saturating_sub(self.settings.token_expiry_millis());
        let ids = order_repo::find_expired_token_ids(&self.pool, cutoff).await?;
        let mut report = SweepReport {
            scanned: ids.len(),
            ..Default::default()
        };

        for order_id in ids {
            match self.expire_payment(order_id, now).await {
                Ok(true) => report.expired += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(order_id, error = %e, "Failed to expire order payment");
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Close one order as CANCELLED/EXPIRED if its token is still expired
    /// and unpaid at write time; `false` when something else got there first
    pub(crate) async fn expire_payment(&self, order_id: i64, now: i64) -> PipelineResult<bool> {
        let cutoff = now.saturating_sub(self.settings.token_expiry_millis());
        let mut tx = self.pool.begin().await?;
        let closed = order_repo::close_unpaid(
            &mut *tx,
            &CloseUnpaid {
                order_id,
                payment_status: PaymentStatus::Expired,
                reason: EXPIRY_REASON,
                now,
                from: &[OrderStatus::PendingPayment],
                from_payment: &[PaymentStatus::Pending, PaymentStatus::Processing],
                issued_at_or_before: Some(cutoff),
            },
        )
        .await?;
        if !closed {
            return Ok(false);
        }

        let updated = payment_repo::resolve_open_attempts(
            &mut *tx,
            order_id,
            None,
            &AttemptUpdate {
                status: PaymentStatus::Expired,
                gateway_transaction_id: None,
                gateway_response: None,
                notes: Some(EXPIRY_REASON),
                now,
            },
        )
        .await?;
        if updated == 0 {
            // No open attempt row to close: leave one terminal record behind
            let order = order_repo::find_by_id(&mut *tx, order_id).await?;
            if let Some(order) = order {
                let mut payment = NewPayment::new(
                    order_id,
                    PaymentMethod::Gateway,
                    order.total_amount,
                    PaymentStatus::Expired,
                );
                payment.reference_number = order.gateway_order_id;
                payment.verification_notes = Some(EXPIRY_REASON.to_string());
                payment.expired_at = Some(now);
                payment_repo::insert(&mut *tx, &payment, now).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(order_id, "Order payment expired");
        self.emit(PosEvent::OrderStatusChanged {
            order_id,
            from: OrderStatus::PendingPayment,
            to: OrderStatus::Cancelled,
        });
        Ok(true)
    }
}

/// Periodic driver of [`OrdersManager::sweep_expired_payments`]
pub struct ExpirySweeper {
    manager: OrdersManager,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(manager: OrdersManager, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            interval,
            shutdown,
        }
    }

    /// Main loop, returns on shutdown
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // A pass runs to completion even if shutdown arrives mid-way
                    if let Err(e) = self.manager.sweep_expired_payments(now_millis()).await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}
