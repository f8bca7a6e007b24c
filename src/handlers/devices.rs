use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    handlers::{idempotency_key, to_body},
    models::{generate_device_id, CreateDevice, Device, DeviceStatus, Resource, UpdateDevice},
    simulator::DELETE_DELAY,
    store::IdCollision,
    AppState,
};

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Device not found: {}", id))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_devices(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let devices = state.devices.list().await;
    info!(count = devices.len(), "Listed devices");
    Ok((StatusCode::OK, to_body(&devices)?))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateDevice>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let key = idempotency_key(&headers, payload.idempotency_key);
    let device = Device::new(
        payload.id.filter(|id| !id.is_empty()),
        payload.name,
        payload.data,
        key,
    );

    let created = state
        .devices
        .create(device, IdCollision::Overwrite, generate_device_id)
        .await;
    let device = created.record;

    if created.existing {
        info!(id = %device.id, key = %device.idempotency_key, "Idempotent replay, returning existing device");
    } else {
        state.device_processing.schedule(&device.id);
        info!(id = %device.id, key = %device.idempotency_key, "Created device");
    }

    Ok((StatusCode::ACCEPTED, to_body(&device)?))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let device = state.devices.get(&id).await.ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::OK, to_body(&device)?))
}

pub async fn device_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let device = state.devices.get(&id).await.ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::OK, to_body(&DeviceStatus::from(&device))?))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDevice>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let device = state
        .devices
        .update(&id, |d| {
            if let Some(name) = payload.name {
                d.set_name(name);
            }
            if let Some(data) = payload.data {
                d.set_data(data);
            }
            d.mark_processing();
        })
        .await
        .ok_or_else(|| not_found(&id))?;

    state.device_processing.schedule(&id);
    info!(id = %id, "Updated device");

    Ok((StatusCode::ACCEPTED, to_body(&device)?))
}

/// Only `name` and `data` are recognized; every other key is ignored.
pub async fn patch_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<Map<String, Value>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let device = state
        .devices
        .update(&id, |d| {
            for (key, value) in &updates {
                match (key.as_str(), value) {
                    ("name", Value::Null) => {}
                    ("name", v) => d.set_name(as_text(v)),
                    ("data", Value::Object(map)) => d.set_data(
                        map.iter()
                            .map(|(k, v)| (k.clone(), as_text(v)))
                            .collect::<HashMap<_, _>>(),
                    ),
                    _ => {}
                }
            }
            d.mark_processing();
        })
        .await
        .ok_or_else(|| not_found(&id))?;

    state.device_processing.schedule(&id);
    info!(id = %id, fields = updates.len(), "Patched device");

    Ok((StatusCode::ACCEPTED, to_body(&device)?))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if !state.device_processing.delete_after(&id, DELETE_DELAY).await {
        return Err(not_found(&id));
    }

    info!(id = %id, delay_ms = DELETE_DELAY.as_millis() as u64, "Device deletion scheduled");

    Ok((
        StatusCode::OK,
        Json(json!({ "message": format!("Device deletion initiated for id = {}", id) })),
    ))
}

pub async fn cleanup_devices(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let cleared = state.devices.len().await;
    state.devices.clear().await;
    info!(cleared, "All devices cleared");
    Ok((StatusCode::OK, Json(json!({ "message": "All devices cleared" }))))
}
