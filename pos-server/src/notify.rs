//! Notification port
//!
//! Fire-and-forget events for downstream observers (WebSocket fan-out,
//! kitchen display, stock alerts). Events are only emitted after the
//! database transaction has committed, and delivery problems never reach the
//! caller of the triggering operation.

use serde::Serialize;
use shared::models::{OrderStatus, PaymentMethod};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Event emitted after a committed state change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PosEvent {
    OrderCreated {
        order_id: i64,
        order_number: String,
        total_amount: f64,
    },
    OrderStatusChanged {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },
    PaymentConfirmed {
        order_id: i64,
        amount: f64,
        method: PaymentMethod,
    },
    LowStock {
        product_id: i64,
        product_name: String,
        quantity: i64,
        threshold: i64,
    },
}

impl PosEvent {
    /// Topic name used by the fan-out layer
    pub fn topic(&self) -> &'static str {
        match self {
            PosEvent::OrderCreated { .. } => "order:created",
            PosEvent::OrderStatusChanged { .. } => "order:status_changed",
            PosEvent::PaymentConfirmed { .. } => "payment:confirmed",
            PosEvent::LowStock { .. } => "inventory:low_stock",
        }
    }
}

/// Injected notification capability
pub trait OrderNotifier: Send + Sync {
    /// Must not block and must not fail
    fn notify(&self, event: PosEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl OrderNotifier for NoopNotifier {
    fn notify(&self, _event: PosEvent) {}
}

/// Publishes events on a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PosEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PosEvent> {
        self.tx.subscribe()
    }
}

impl OrderNotifier for BroadcastNotifier {
    fn notify(&self, event: PosEvent) {
        let topic = event.topic();
        if let Err(e) = self.tx.send(event) {
            // No subscribers connected
            tracing::debug!(topic, error = %e, "Event dropped");
        }
    }
}

/// Trace every published event until shutdown
pub async fn log_events(mut rx: broadcast::Receiver<PosEvent>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => tracing::debug!(topic = event.topic(), ?event, "Event published"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let event = PosEvent::OrderStatusChanged {
            order_id: 1,
            from: OrderStatus::Paid,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(event.topic(), "order:status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_status_changed");
        assert_eq!(json["to"], "CANCELLED");
    }

    #[test]
    fn test_broadcast_without_subscribers_is_swallowed() {
        let notifier = BroadcastNotifier::new(8);
        notifier.notify(PosEvent::LowStock {
            product_id: 1,
            product_name: "Latte".into(),
            quantity: 1,
            threshold: 5,
        });
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscriber() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.notify(PosEvent::PaymentConfirmed {
            order_id: 9,
            amount: 25000.0,
            method: PaymentMethod::Cash,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "payment:confirmed");
    }
}
