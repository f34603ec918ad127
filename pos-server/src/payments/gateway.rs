//! Gateway port and wire types
//!
//! The orchestrator talks to the payment gateway only through
//! [`PaymentGateway`]. Wire types follow the hosted-checkout (Snap) shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected credentials: {0}")]
    Auth(String),

    /// The gateway already has a transaction for this order id
    #[error("gateway reports duplicate order id: {0}")]
    Duplicate(String),

    #[error("gateway transaction not found: {0}")]
    NotFound(String),

    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub order_id: String,
    /// Integer currency units
    pub gross_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl CustomerDetails {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callbacks {
    pub finish: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expiry {
    pub unit: String,
    pub duration: i64,
}

/// Transaction creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callbacks: Option<Callbacks>,
    pub expiry: Expiry,
}

/// Token handed back for a created transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionToken {
    pub token: String,
    pub redirect_url: String,
}

/// Current state of a transaction as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransactionStatus {
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl GatewayTransactionStatus {
    pub fn outcome(&self) -> GatewayOutcome {
        GatewayOutcome::from_status(&self.transaction_status, self.fraud_status.as_deref())
    }
}

/// Gateway status mapped onto the order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Money captured: order PAID, payment COMPLETED
    Settled,
    /// Captured but held for fraud review: AWAITING_CONFIRMATION / PROCESSING
    Challenged,
    /// Still waiting for the customer
    Pending,
    /// Denied, cancelled or failed: CANCELLED / FAILED
    Failed,
    /// Checkout window closed: CANCELLED / EXPIRED
    Expired,
    /// Money returned: REFUNDED / REFUNDED
    Refunded,
    /// Status this adapter does not know; never mutates anything
    Unknown,
}

impl GatewayOutcome {
    pub fn from_status(transaction_status: &str, fraud_status: Option<&str>) -> Self {
        match (transaction_status, fraud_status) {
            ("capture" | "settlement", Some("challenge")) => Self::Challenged,
            ("capture" | "settlement", Some("deny")) => Self::Failed,
            ("capture" | "settlement", None | Some("accept")) => Self::Settled,
            ("pending", _) => Self::Pending,
            ("deny" | "cancel" | "failure", _) => Self::Failed,
            ("expire", _) => Self::Expired,
            ("refund" | "partial_refund", _) => Self::Refunded,
            _ => Self::Unknown,
        }
    }
}

/// Payment gateway capability
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name stored on payment rows
    fn name(&self) -> &'static str;

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionToken, GatewayError>;

    async fn transaction_status(
        &self,
        gateway_order_id: &str,
    ) -> Result<GatewayTransactionStatus, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        use GatewayOutcome::*;
        let cases = [
            ("capture", Some("accept"), Settled),
            ("capture", None, Settled),
            ("capture", Some("challenge"), Challenged),
            ("capture", Some("deny"), Failed),
            ("settlement", None, Settled),
            ("settlement", Some("accept"), Settled),
            ("settlement", Some("challenge"), Challenged),
            ("settlement", Some("deny"), Failed),
            ("settlement", Some("review"), Unknown),
            ("pending", None, Pending),
            ("deny", None, Failed),
            ("cancel", None, Failed),
            ("failure", None, Failed),
            ("expire", None, Expired),
            ("refund", None, Refunded),
            ("partial_refund", None, Refunded),
            ("authorize", None, Unknown),
        ];
        for (status, fraud, expected) in cases {
            assert_eq!(GatewayOutcome::from_status(status, fraud), expected, "{status} {fraud:?}");
        }
    }

    #[test]
    fn test_request_skips_empty_optionals() {
        let request = TransactionRequest {
            transaction_details: TransactionDetails {
                order_id: "ORD-1".into(),
                gross_amount: 25000,
            },
            item_details: vec![],
            customer_details: None,
            callbacks: None,
            expiry: Expiry {
                unit: "minutes".into(),
                duration: 10,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("customer_details").is_none());
        assert!(json.get("callbacks").is_none());
        assert_eq!(json["transaction_details"]["gross_amount"], 25000);
    }
}
