//! Ingest endpoint: `POST /publish/{routing_key}`.
//!
//! Puts the body on the in-process broker under `routing_key`, exactly as
//! if it had arrived from the message broker. Decoding and fan-out happen
//! in the consumer, so this route only checks auth and that the body is JSON.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use relay_broker::BrokerError;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app::AppState;

/// Returns 200 + receipt ID once the message is queued, 404 when ingest is
/// disabled, 401 on a bad token, 400 on a non-JSON body.
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(routing_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let cfg = &state.config.ingest;

    if !cfg.enabled {
        warn!(routing_key = %routing_key, "publish received but ingest is disabled");
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "ingest is disabled"})),
        ));
    }

    if let Some(expected) = cfg.token.as_deref() {
        verify_bearer_token(&headers, expected).map_err(|e| auth_error(&e))?;
    }

    if let Err(e) = serde_json::from_slice::<Value>(&body) {
        warn!(routing_key = %routing_key, error = %e, "invalid JSON in publish body");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid JSON body"})),
        ));
    }

    let bytes = body.len();
    let delivery_tag = state
        .broker
        .publish(routing_key.clone(), body.to_vec())
        .await
        .map_err(|e| {
            warn!(routing_key = %routing_key, error = %e, "failed to queue published message");
            let status = match e {
                BrokerError::Closed => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"error": e.to_string()})))
        })?;

    let receipt_id = uuid::Uuid::new_v4().to_string();
    info!(
        routing_key = %routing_key,
        bytes,
        delivery_tag,
        receipt_id = %receipt_id,
        "message accepted"
    );
    Ok(Json(json!({"ok": true, "receipt_id": receipt_id})))
}

/// Verify a static bearer token in the `Authorization: Bearer <token>` header.
fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}

fn auth_error(reason: &str) -> (StatusCode, Json<Value>) {
    warn!(reason = %reason, "publish authentication failed");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "authentication failed", "reason": reason})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn bearer_token_checks() {
        assert!(verify_bearer_token(&headers("Bearer s3cret"), "s3cret").is_ok());
        assert!(verify_bearer_token(&headers("Bearer wrong"), "s3cret").is_err());
        assert!(verify_bearer_token(&headers("Basic s3cret"), "s3cret").is_err());
        assert!(verify_bearer_token(&HeaderMap::new(), "s3cret").is_err());
    }
}
