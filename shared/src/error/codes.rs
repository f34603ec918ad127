//! Unified error codes for the POS pipeline
//!
//! This module defines all error codes used by pos-server and its consumers.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product / inventory errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller did not supply an authenticated actor
    NotAuthenticated = 1001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order is already settled (paid or later)
    OrderAlreadySettled = 4003,
    /// Order is in a status that cannot be settled
    OrderNotSettleable = 4004,
    /// Status transition not allowed by the state machine
    InvalidTransition = 4005,
    /// Order has been cancelled
    OrderCancelled = 4006,
    /// Order has no items
    OrderEmpty = 4007,
    /// Order number already used
    DuplicateOrderNumber = 4008,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Tendered amount is below the amount due
    PaymentInsufficientAmount = 5002,
    /// Gateway rejected a duplicate transaction identifier
    DuplicateTransaction = 5003,
    /// Gateway rejected our credentials
    GatewayAuthFailed = 5004,
    /// Gateway unreachable or timed out
    GatewayUnavailable = 5005,
    /// Retry budget for gateway payment exhausted
    MaxRetriesExceeded = 5006,
    /// Payment token has expired
    PaymentTokenExpired = 5007,
    /// Notification signature mismatch
    InvalidSignature = 5008,

    // ==================== 6xxx: Product / Inventory ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Not enough stock on hand
    InsufficientStock = 6002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Multi-entity transaction failed and was rolled back
    TransactionFailed = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl ErrorCode {
    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is the success code
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderAlreadySettled => "Order has already been settled",
            ErrorCode::OrderNotSettleable => "Order cannot be settled in its current status",
            ErrorCode::InvalidTransition => "Order status transition not allowed",
            ErrorCode::OrderCancelled => "Order has been cancelled",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::DuplicateOrderNumber => "Order number already exists",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentInsufficientAmount => "Insufficient payment amount",
            ErrorCode::DuplicateTransaction => "Duplicate payment transaction",
            ErrorCode::GatewayAuthFailed => "Payment gateway rejected credentials",
            ErrorCode::GatewayUnavailable => "Payment gateway unavailable",
            ErrorCode::MaxRetriesExceeded => "Maximum payment retries exceeded",
            ErrorCode::PaymentTokenExpired => "Payment token has expired",
            ErrorCode::InvalidSignature => "Invalid notification signature",

            // Product / Inventory
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::InsufficientStock => "Insufficient stock",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::TransactionFailed => "Transaction failed and was rolled back",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderAlreadyPaid),
            4003 => Ok(ErrorCode::OrderAlreadySettled),
            4004 => Ok(ErrorCode::OrderNotSettleable),
            4005 => Ok(ErrorCode::InvalidTransition),
            4006 => Ok(ErrorCode::OrderCancelled),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::DuplicateOrderNumber),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentInsufficientAmount),
            5003 => Ok(ErrorCode::DuplicateTransaction),
            5004 => Ok(ErrorCode::GatewayAuthFailed),
            5005 => Ok(ErrorCode::GatewayUnavailable),
            5006 => Ok(ErrorCode::MaxRetriesExceeded),
            5007 => Ok(ErrorCode::PaymentTokenExpired),
            5008 => Ok(ErrorCode::InvalidSignature),

            // Product / Inventory
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::InsufficientStock),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::TransactionFailed),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4005);
        assert_eq!(ErrorCode::DuplicateOrderNumber.code(), 4008);
        assert_eq!(ErrorCode::PaymentInsufficientAmount.code(), 5002);
        assert_eq!(ErrorCode::MaxRetriesExceeded.code(), 5006);
        assert_eq!(ErrorCode::InsufficientStock.code(), 6002);
        assert_eq!(ErrorCode::TransactionFailed.code(), 9003);
    }

    #[test]
    fn test_try_from_covers_every_variant() {
        let all = [
            ErrorCode::Success,
            ErrorCode::Unknown,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::InvalidRequest,
            ErrorCode::NotAuthenticated,
            ErrorCode::OrderNotFound,
            ErrorCode::OrderAlreadyPaid,
            ErrorCode::OrderAlreadySettled,
            ErrorCode::OrderNotSettleable,
            ErrorCode::InvalidTransition,
            ErrorCode::OrderCancelled,
            ErrorCode::OrderEmpty,
            ErrorCode::DuplicateOrderNumber,
            ErrorCode::PaymentFailed,
            ErrorCode::PaymentInsufficientAmount,
            ErrorCode::DuplicateTransaction,
            ErrorCode::GatewayAuthFailed,
            ErrorCode::GatewayUnavailable,
            ErrorCode::MaxRetriesExceeded,
            ErrorCode::PaymentTokenExpired,
            ErrorCode::InvalidSignature,
            ErrorCode::ProductNotFound,
            ErrorCode::InsufficientStock,
            ErrorCode::InternalError,
            ErrorCode::DatabaseError,
            ErrorCode::TransactionFailed,
            ErrorCode::TimeoutError,
            ErrorCode::ConfigError,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(7001), Err(InvalidErrorCode(7001)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::OrderNotFound).unwrap();
        assert_eq!(json, "4001");
        let code: ErrorCode = serde_json::from_str("5002").unwrap();
        assert_eq!(code, ErrorCode::PaymentInsufficientAmount);
        assert!(serde_json::from_str::<ErrorCode>("10000").is_err());
    }

    #[test]
    fn test_display_and_message() {
        assert_eq!(format!("{}", ErrorCode::OrderNotFound), "4001");
        assert_eq!(ErrorCode::OrderNotFound.message(), "Order not found");
        assert_eq!(
            format!("{}", InvalidErrorCode(999)),
            "invalid error code: 999"
        );
    }
}
