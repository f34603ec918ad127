//! Shared types for the POS transaction pipeline
//!
//! Common types used by the pos-server and by front-end consumers:
//! the unified error system, the order/payment/inventory models and
//! small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use serde::{Deserialize, Serialize};
