//! Pipeline inputs and outputs
//!
//! Request types double as HTTP payloads; `validator` derives cover the
//! shape checks, the orchestrator re-checks business invariants.

use serde::{Deserialize, Serialize};
use shared::models::{OrderSource, OrderStatus, OrderType, PaymentMethod};
use validator::Validate;

/// Authenticated caller, supplied by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: String,
}

impl Actor {
    pub fn new(id: i64, role: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
        }
    }

    /// Internal actor for background jobs (expiry sweep, gateway callbacks)
    pub fn system() -> Self {
        Self::new(0, "system")
    }
}

/// Cart line as submitted by the client
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_id: i64,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    /// Client-side price; defaults to the catalog price
    #[validate(range(min = 0.0))]
    pub unit_price: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub discount_amount: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub tax_amount: f64,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Generated when absent
    #[validate(length(min = 1, max = 64))]
    pub order_number: Option<String>,
    pub order_type: OrderType,
    #[serde(default = "default_source")]
    pub order_source: OrderSource,
    #[validate(length(max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 30))]
    pub customer_phone: Option<String>,
    #[validate(length(max = 254))]
    pub customer_email: Option<String>,
    #[validate(length(max = 20))]
    pub table_number: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "order must contain at least one item"), nested)]
    pub items: Vec<OrderItemInput>,
    /// Client-computed subtotal, checked against the lines when present
    #[validate(range(min = 0.0))]
    pub subtotal: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub discount_amount: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub tax_amount: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub service_charge: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub delivery_fee: f64,
    /// Client-computed total, checked against the totals formula when present
    #[validate(range(min = 0.0))]
    pub total_amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
}

fn default_source() -> OrderSource {
    OrderSource::Cashier
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(range(min = 0.0))]
    pub paid_amount: f64,
    /// Defaults to `paid_amount - total_amount`
    #[validate(range(min = 0.0))]
    pub change_amount: Option<f64>,
    /// Defaults to the order's method, then CASH
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64) -> OrderItemInput {
        OrderItemInput {
            product_id: 1,
            quantity,
            unit_price: Some(10000.0),
            discount_amount: 0.0,
            tax_amount: 0.0,
            notes: None,
        }
    }

    fn request(items: Vec<OrderItemInput>) -> CreateOrderRequest {
        CreateOrderRequest {
            order_number: None,
            order_type: OrderType::Takeaway,
            order_source: OrderSource::Cashier,
            customer_name: None,
            customer_phone: None,
            customer_email: None,
            table_number: None,
            notes: None,
            items,
            subtotal: None,
            discount_amount: 0.0,
            tax_amount: 0.0,
            service_charge: 0.0,
            delivery_fee: 0.0,
            total_amount: None,
            payment_method: None,
        }
    }

    #[test]
    fn test_create_order_validation() {
        assert!(request(vec![item(2)]).validate().is_ok());
        assert!(request(vec![]).validate().is_err());
        assert!(request(vec![item(0)]).validate().is_err());
    }

    #[test]
    fn test_create_order_deserialize_defaults() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "order_type": "DINE_IN",
            "items": [{ "product_id": 3, "quantity": 1 }]
        }))
        .unwrap();
        assert_eq!(req.order_source, OrderSource::Cashier);
        assert_eq!(req.items[0].discount_amount, 0.0);
        assert!(req.items[0].unit_price.is_none());
    }

    #[test]
    fn test_negative_paid_amount_rejected() {
        let req = ConfirmPaymentRequest {
            paid_amount: -1.0,
            change_amount: None,
            payment_method: None,
            reference_number: None,
            notes: None,
        };
        assert!(req.validate().is_err());
    }
}
