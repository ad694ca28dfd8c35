use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe plus hub and broker counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.hub.stats();
    let broker = state.broker_status.borrow().clone();
    let status = if state.hub.is_shutdown() {
        "shutting_down"
    } else {
        "ok"
    };

    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": stats.active_subscribers,
        "published_total": stats.published_total,
        "slow_disconnects": stats.slow_disconnects,
        "broker": broker,
    }))
}
