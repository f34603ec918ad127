//! Order Model

use serde::{Deserialize, Serialize};

use super::payment::{PaymentMethod, PaymentStatus};

/// Order lifecycle status
///
/// ```text
/// DRAFT -> PENDING_PAYMENT -> PAID -> PREPARING -> READY -> COMPLETED
///               |    ^          |
///               v    |          v
///           CANCELLED       REFUNDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    Draft,
    PendingPayment,
    AwaitingConfirmation,
    Paid,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Statuses in which a payment may still be settled
    pub const SETTLEABLE: [OrderStatus; 3] = [
        OrderStatus::Draft,
        OrderStatus::PendingPayment,
        OrderStatus::AwaitingConfirmation,
    ];

    /// Statuses whose stock has already been decremented
    pub const STOCK_DECREMENTED: [OrderStatus; 4] = [
        OrderStatus::Paid,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    pub fn is_settleable(&self) -> bool {
        Self::SETTLEABLE.contains(self)
    }

    /// PAID or any later non-reversal status
    pub fn is_settled(&self) -> bool {
        Self::STOCK_DECREMENTED.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            Self::Paid => "PAID",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderType {
    DineIn,
    Takeaway,
    Delivery,
}

/// Where the order was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderSource {
    Cashier,
    Customer,
    Online,
}

/// Order entity
///
/// Money fields are stored as `f64` and recomputed with `rust_decimal`
/// wherever they are compared or summed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub order_type: OrderType,
    pub order_source: OrderSource,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub table_number: Option<String>,
    pub notes: Option<String>,

    // === Money ===
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub service_charge: f64,
    pub delivery_fee: f64,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub change_amount: f64,
    pub payment_method: Option<PaymentMethod>,

    // === Gateway session ===
    pub payment_token: Option<String>,
    pub payment_redirect_url: Option<String>,
    /// Identifier sent to the gateway for the current attempt
    pub gateway_order_id: Option<String>,
    /// When the current gateway token was issued
    pub token_issued_at: Option<i64>,

    // === Lifecycle timestamps ===
    pub paid_at: Option<i64>,
    pub preparing_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub cancellation_reason: Option<String>,

    pub created_by: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,

    /// Lines, loaded separately
    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Order line
///
/// `product_name` and `unit_price` are snapshots taken at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub cost_price: Option<f64>,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_groups() {
        assert!(OrderStatus::PendingPayment.is_settleable());
        assert!(OrderStatus::AwaitingConfirmation.is_settleable());
        assert!(!OrderStatus::Paid.is_settleable());
        assert!(!OrderStatus::Cancelled.is_settleable());

        assert!(OrderStatus::Ready.is_settled());
        assert!(!OrderStatus::Refunded.is_settled());
        assert!(OrderStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_status_serde_matches_display() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::PendingPayment,
            OrderStatus::AwaitingConfirmation,
            OrderStatus::Paid,
            OrderStatus::Completed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }
}
