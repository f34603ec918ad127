use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use thiserror::Error;

use crate::db::repository::RepoError;
use crate::payments::GatewayError;

/// Business errors of the transaction pipeline
///
/// Every variant carries enough context for an HTTP mapping without a
/// second lookup (current status, shortage, retry counts).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order already settled (status {status})")]
    OrderAlreadySettled { status: OrderStatus },

    #[error("Order cannot be settled in status {status}")]
    OrderNotSettleable { status: OrderStatus },

    #[error("Insufficient payment: total {total}, paid {paid}, short by {shortage}")]
    InsufficientPayment { total: f64, paid: f64, shortage: f64 },

    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Order number already exists: {0}")]
    DuplicateOrderNumber(String),

    #[error("Duplicate gateway transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Payment gateway rejected credentials: {0}")]
    GatewayAuth(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Maximum gateway retries exceeded ({attempts}/{max})")]
    MaxRetriesExceeded { attempts: i64, max: i64 },

    #[error("Payment token expired for order {order_id}")]
    TokenExpired { order_id: i64 },

    #[error("Order already paid (status {status})")]
    AlreadyPaid { status: OrderStatus },

    #[error("Order {order_id} is cancelled")]
    OrderCancelled { order_id: i64 },

    #[error("Invalid gateway notification signature")]
    InvalidSignature,

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn order_not_found(id: i64) -> Self {
        Self::NotFound {
            resource: "Order",
            id: id.to_string(),
        }
    }

    pub fn product_not_found(id: i64) -> Self {
        Self::NotFound {
            resource: "Product",
            id: id.to_string(),
        }
    }
}

impl From<RepoError> for PipelineError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => Self::NotFound {
                resource: "Record",
                id: what,
            },
            // Any storage failure inside a unit of work aborts the whole unit
            RepoError::Duplicate(msg) | RepoError::Database(msg) => Self::TransactionFailed(msg),
        }
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::from(err).into()
    }
}

impl From<GatewayError> for PipelineError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Auth(msg) => Self::GatewayAuth(msg),
            GatewayError::Duplicate(msg) => Self::DuplicateTransaction(msg),
            GatewayError::NotFound(id) => Self::NotFound {
                resource: "Gateway transaction",
                id,
            },
            GatewayError::Timeout => Self::GatewayUnavailable("request timed out".into()),
            GatewayError::Unavailable(msg) | GatewayError::InvalidResponse(msg) => {
                Self::GatewayUnavailable(msg)
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::ValidationFailed(_) => {
                AppError::with_message(ErrorCode::ValidationFailed, message)
            }
            PipelineError::NotFound { resource, id } => {
                let code = match resource {
                    "Order" => ErrorCode::OrderNotFound,
                    "Product" => ErrorCode::ProductNotFound,
                    _ => ErrorCode::NotFound,
                };
                AppError::with_message(code, message)
                    .with_detail("resource", resource)
                    .with_detail("id", id)
            }
            PipelineError::InvalidTransition { from, to } => {
                AppError::with_message(ErrorCode::InvalidTransition, message)
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            PipelineError::OrderAlreadySettled { status } => {
                AppError::with_message(ErrorCode::OrderAlreadySettled, message)
                    .with_detail("status", status.as_str())
            }
            PipelineError::OrderNotSettleable { status } => {
                AppError::with_message(ErrorCode::OrderNotSettleable, message)
                    .with_detail("status", status.as_str())
            }
            PipelineError::InsufficientPayment {
                total,
                paid,
                shortage,
            } => AppError::with_message(ErrorCode::PaymentInsufficientAmount, message)
                .with_detail("total", total)
                .with_detail("paid", paid)
                .with_detail("shortage", shortage),
            PipelineError::InsufficientStock {
                product_id,
                available,
                requested,
            } => AppError::with_message(ErrorCode::InsufficientStock, message)
                .with_detail("product_id", product_id)
                .with_detail("available", available)
                .with_detail("requested", requested),
            PipelineError::DuplicateOrderNumber(number) => {
                AppError::with_message(ErrorCode::DuplicateOrderNumber, message)
                    .with_detail("order_number", number)
            }
            PipelineError::DuplicateTransaction(_) => {
                AppError::with_message(ErrorCode::DuplicateTransaction, message)
            }
            PipelineError::GatewayAuth(_) => {
                AppError::with_message(ErrorCode::GatewayAuthFailed, message)
            }
            PipelineError::GatewayUnavailable(_) => {
                AppError::with_message(ErrorCode::GatewayUnavailable, message)
            }
            PipelineError::MaxRetriesExceeded { attempts, max } => {
                AppError::with_message(ErrorCode::MaxRetriesExceeded, message)
                    .with_detail("attempts", attempts)
                    .with_detail("max", max)
            }
            PipelineError::TokenExpired { order_id } => {
                AppError::with_message(ErrorCode::PaymentTokenExpired, message)
                    .with_detail("order_id", order_id)
            }
            PipelineError::AlreadyPaid { status } => {
                AppError::with_message(ErrorCode::OrderAlreadyPaid, message)
                    .with_detail("status", status.as_str())
            }
            PipelineError::OrderCancelled { order_id } => {
                AppError::with_message(ErrorCode::OrderCancelled, message)
                    .with_detail("order_id", order_id)
            }
            PipelineError::InvalidSignature => {
                AppError::with_message(ErrorCode::InvalidSignature, message)
            }
            PipelineError::TransactionFailed(_) => {
                AppError::with_message(ErrorCode::TransactionFailed, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_insufficient_payment_maps_with_shortage() {
        let err: AppError = PipelineError::InsufficientPayment {
            total: 25000.0,
            paid: 20000.0,
            shortage: 5000.0,
        }
        .into();
        assert_eq!(err.code, ErrorCode::PaymentInsufficientAmount);
        let details = err.details.as_ref().unwrap();
        assert_eq!(details.get("shortage").unwrap(), 5000.0);
        assert_eq!(err.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_picks_resource_code() {
        let err: AppError = PipelineError::order_not_found(7).into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        let err: AppError = PipelineError::product_not_found(3).into();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_errors_carry_current_status() {
        let err: AppError = PipelineError::OrderAlreadySettled {
            status: OrderStatus::Paid,
        }
        .into();
        assert_eq!(err.details.unwrap().get("status").unwrap(), "PAID");
    }

    #[test]
    fn test_repo_errors_become_transaction_failed() {
        let err: PipelineError = RepoError::Database("disk I/O error".into()).into();
        assert!(matches!(err, PipelineError::TransactionFailed(_)));
    }

    #[test]
    fn test_gateway_errors() {
        assert!(matches!(
            PipelineError::from(GatewayError::Timeout),
            PipelineError::GatewayUnavailable(_)
        ));
        assert!(matches!(
            PipelineError::from(GatewayError::Auth("401".into())),
            PipelineError::GatewayAuth(_)
        ));
        assert!(matches!(
            PipelineError::from(GatewayError::Duplicate("406".into())),
            PipelineError::DuplicateTransaction(_)
        ));
    }
}
