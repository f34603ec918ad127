//! Inventory routes
//!
//! | Path | Method | Operation |
//! |------|--------|-----------|
//! | /api/inventory/{product_id}/adjust | POST | manual ledger entry |
//! | /api/inventory/{product_id}/logs | GET | ledger rows, oldest first |
//! | /api/inventory/{product_id}/verify | GET | quantity vs latest ledger row |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use shared::models::InventoryLog;

use super::validated;
use crate::core::ServerState;
use crate::inventory::{AdjustStockRequest, LedgerCheck};
use crate::orders::Actor;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/inventory", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{product_id}/adjust", post(adjust))
        .route("/{product_id}/logs", get(logs))
        .route("/{product_id}/verify", get(verify))
}

async fn adjust(
    State(state): State<ServerState>,
    actor: Actor,
    Path(product_id): Path<i64>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<InventoryLog>> {
    let payload = validated(payload)?;
    Ok(Json(state.inventory.adjust_stock(product_id, payload, &actor).await?))
}

async fn logs(
    State(state): State<ServerState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Vec<InventoryLog>>> {
    Ok(Json(state.inventory.list_logs(product_id).await?))
}

async fn verify(
    State(state): State<ServerState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<LedgerCheck>> {
    Ok(Json(state.inventory.verify_ledger(product_id).await?))
}
