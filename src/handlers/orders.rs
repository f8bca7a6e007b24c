use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    handlers::{idempotency_key, to_body},
    models::{CreateOrder, OrderStatusView, PaymentOrder},
    store::IdCollision,
    AppState,
};

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Order not found: {}", id))
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_orders(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let orders = state.orders.list().await;
    info!(count = orders.len(), "Listed orders");
    Ok((StatusCode::OK, to_body(&orders)?))
}

// ── Create ────────────────────────────────────────────────────────────────────

/// An order whose key or `orderId` is already known is returned unchanged.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<CreateOrder>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let order_id = payload
        .order_id
        .take()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("orderId is required".to_string()))?;

    payload.idempotency_key = idempotency_key(&headers, payload.idempotency_key.take());
    let order = PaymentOrder::from_request(order_id.clone(), payload);

    let created = state
        .orders
        .create(order, IdCollision::ReturnExisting, || order_id)
        .await;
    let order = created.record;

    if created.existing {
        info!(order_id = %order.order_id, "Idempotent replay, returning existing order");
    } else {
        state.order_processing.schedule(&order.order_id);
        info!(
            order_id = %order.order_id,
            job_id = order.job_id.as_deref().unwrap_or_default(),
            amount = order.amount,
            "Accepted payment order"
        );
    }

    Ok((StatusCode::ACCEPTED, to_body(&order)?))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let order = state.orders.get(&id).await.ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::OK, to_body(&order)?))
}

pub async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let order = state.orders.get(&id).await.ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::OK, to_body(&OrderStatusView::from(&order))?))
}

pub async fn cleanup_orders(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let cleared = state.orders.len().await;
    state.orders.clear().await;
    info!(cleared, "All orders cleared");
    Ok((StatusCode::OK, Json(json!({ "message": "All orders cleared" }))))
}
