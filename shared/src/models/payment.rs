//! Payment Model

use serde::{Deserialize, Serialize};

/// Payment status, used both for payment records and the order's
/// aggregate `payment_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
    Refunded,
}

impl PaymentStatus {
    /// Whether a new gateway attempt may replace this one
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PaymentMethod {
    Cash,
    Qris,
    DebitCard,
    CreditCard,
    BankTransfer,
    EWallet,
    /// Hosted checkout of the external payment gateway
    Gateway,
}

impl PaymentMethod {
    /// Methods the cashier confirms by hand
    pub fn is_manual(&self) -> bool {
        !matches!(self, Self::Gateway)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Qris => "QRIS",
            Self::DebitCard => "DEBIT_CARD",
            Self::CreditCard => "CREDIT_CARD",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::EWallet => "E_WALLET",
            Self::Gateway => "GATEWAY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransactionType {
    Payment,
    Refund,
}

/// Payment attempt
///
/// At most one COMPLETED payment exists per order (partial unique index).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    pub amount: f64,
    pub status: PaymentStatus,
    pub transaction_type: TransactionType,
    pub gateway_name: Option<String>,
    pub gateway_transaction_id: Option<String>,
    /// Gateway order id, cash reference or card slip number
    pub reference_number: Option<String>,
    /// Raw gateway payload, JSON text
    pub gateway_response: Option<String>,
    pub verified_by: Option<i64>,
    pub verified_at: Option<i64>,
    pub verification_notes: Option<String>,
    pub paid_at: Option<i64>,
    pub expired_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(PaymentStatus::Pending.is_retryable());
        assert!(PaymentStatus::Failed.is_retryable());
        assert!(PaymentStatus::Expired.is_retryable());
        assert!(!PaymentStatus::Completed.is_retryable());
        assert!(!PaymentStatus::Refunded.is_retryable());
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&PaymentMethod::EWallet).unwrap();
        assert_eq!(json, "\"E_WALLET\"");
        let parsed: PaymentMethod = serde_json::from_str("\"DEBIT_CARD\"").unwrap();
        assert_eq!(parsed, PaymentMethod::DebitCard);
        assert!(!PaymentMethod::Gateway.is_manual());
    }
}
