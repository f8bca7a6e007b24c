use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    handlers::to_body,
    models::short_uuid,
    AppState,
};

// ── POST /api/v1/payments/:order_id ──────────────────────────────────────────

/// Accepts the payment only while the admission counter is under its ceiling.
pub async fn process_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let admission = state.payments.admit();

    if !admission.accepted {
        warn!(
            order_id = %order_id,
            current = admission.current,
            "Payment rejected by backpressure"
        );
        return Err(AppError::RateLimited {
            current_requests: admission.current,
        });
    }

    let job_id = format!("job-v1-{}", short_uuid(8));
    info!(order_id = %order_id, job_id = %job_id, current = admission.current, "Payment accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "orderId": order_id,
            "jobId": job_id,
            "status": "ACCEPTED",
            "message": "Payment processing initiated",
            "timestamp": Utc::now(),
        })),
    ))
}

// ── GET /api/v1/payments/_metrics ────────────────────────────────────────────

pub async fn payment_metrics(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Value>)> {
    Ok((StatusCode::OK, to_body(&state.payments.snapshot())?))
}
