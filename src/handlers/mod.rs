pub mod devices;
pub mod orders;
pub mod payments;

use anyhow::Context;
use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AppResult;

/// Request header that overrides the idempotency key carried in the body.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "async-pattern-service" })),
    )
}

/// Serializes a response body; a failure surfaces as a 500.
pub(crate) fn to_body<T: Serialize>(value: &T) -> AppResult<Json<Value>> {
    let value = serde_json::to_value(value).context("Failed to serialize response body")?;
    Ok(Json(value))
}

/// Header key if present and non-blank, else the body key.
pub(crate) fn idempotency_key(headers: &HeaderMap, body_key: Option<String>) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or(body_key)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::models::Outcome;
    use crate::simulator::testing::FixedCompletion;
    use crate::AppState;

    /// Router whose completions always end with `outcome` after `delay`.
    pub fn app(delay: Duration, outcome: Outcome) -> (Router, AppState) {
        let state = AppState::with_policies(
            FixedCompletion::new(delay, outcome),
            FixedCompletion::new(delay, outcome),
            8,
        );
        (crate::build_router(state.clone()), state)
    }

    pub async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
