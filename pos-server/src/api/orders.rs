//! Order routes
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/orders | POST | create order |
//! | /api/orders/{id} | GET | order with items |
//! | /api/orders/{id} | DELETE | soft delete (terminal orders) |
//! | /api/orders/{id}/confirm-payment | POST | cash path settlement |
//! | /api/orders/{id}/status | POST | general status update |
//! | /api/orders/{id}/cancel | POST | cancel with stock restoration |
//! | /api/orders/{id}/payments | GET | payment attempts |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use shared::models::{Order, Payment};

use super::validated;
use crate::core::ServerState;
use crate::orders::{
    Actor, CancelOrderRequest, ConfirmPaymentRequest, CreateOrderRequest, UpdateStatusRequest,
};
use crate::utils::{ApiResponse, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(get_by_id).delete(soft_delete))
        .route("/{id}/confirm-payment", post(confirm_payment))
        .route("/{id}/status", post(update_status))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/payments", get(list_payments))
}

async fn create(
    State(state): State<ServerState>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<Order>> {
    let payload = validated(payload)?;
    let order = state.orders.create_order(payload, &actor).await?;
    Ok(Json(order))
}

async fn get_by_id(State(state): State<ServerState>, Path(id): Path<i64>) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get_order(id).await?))
}

async fn soft_delete(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    state.orders.soft_delete_order(id, &actor).await?;
    Ok(ApiResponse::ok())
}

async fn confirm_payment(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<Order>> {
    let payload = validated(payload)?;
    Ok(Json(state.orders.confirm_payment(id, payload, &actor).await?))
}

async fn update_status(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let payload = validated(payload)?;
    Ok(Json(state.orders.update_status(id, payload, &actor).await?))
}

async fn cancel(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<i64>,
    payload: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<Order>> {
    let payload = validated(payload.map(|Json(p)| p).unwrap_or_default())?;
    Ok(Json(state.orders.cancel_order(id, payload, &actor).await?))
}

async fn list_payments(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Payment>>> {
    Ok(Json(state.orders.list_payments(id).await?))
}
