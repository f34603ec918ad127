//! HTTP routes
//!
//! | Module | Routes |
//! |--------|--------|
//! | [`health`] | `/health` |
//! | [`orders`] | `/api/orders/...` |
//! | [`payments`] | gateway checkout, retry, status and webhook |
//! | [`inventory`] | `/api/inventory/...` |
//!
//! Authentication happens upstream; handlers only read the actor it set.

pub mod extractor;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;

use axum::Router;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// Full application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(inventory::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the DTO's `validator` rules before it reaches the orchestrator
pub(crate) fn validated<T: Validate>(payload: T) -> AppResult<T> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    Ok(payload)
}
