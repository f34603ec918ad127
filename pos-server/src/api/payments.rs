//! Gateway routes
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/orders/{id}/payments/gateway | POST | issue or reuse a checkout token |
//! | /api/orders/{id}/payments/gateway/retry | POST | new attempt, new correlation id |
//! | /api/orders/{id}/payments/gateway/status | GET | poll the gateway and apply |
//! | /api/payments/notification | POST | signed gateway webhook |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use shared::models::Order;

use crate::core::ServerState;
use crate::orders::Actor;
use crate::payments::{GatewayCheckout, GatewayNotification};
use crate::utils::{ApiResponse, AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders/{id}/payments/gateway", post(create_transaction))
        .route("/api/orders/{id}/payments/gateway/retry", post(retry_transaction))
        .route("/api/orders/{id}/payments/gateway/status", get(check_status))
        .route("/api/payments/notification", post(notification))
}

async fn create_transaction(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> AppResult<Json<GatewayCheckout>> {
    Ok(Json(state.orders.create_gateway_transaction(id, &actor).await?))
}

async fn retry_transaction(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> AppResult<Json<GatewayCheckout>> {
    Ok(Json(state.orders.retry_gateway_transaction(id, &actor).await?))
}

async fn check_status(State(state): State<ServerState>, Path(id): Path<i64>) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.check_gateway_status(id).await?))
}

/// Webhook: no actor, authenticity comes from the signature
///
/// The raw body is kept verbatim for the payment's audit trail.
async fn notification(State(state): State<ServerState>, body: String) -> AppResult<ApiResponse<()>> {
    let payload: GatewayNotification = serde_json::from_str(&body)
        .map_err(|e| AppError::invalid_request(format!("Malformed notification: {e}")))?;
    state
        .orders
        .handle_gateway_notification(&payload, &body, &state.config.gateway_server_key)
        .await?;
    Ok(ApiResponse::ok())
}
