use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe plus tool session status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.agent.model(),
        "provider": state.agent.provider_name(),
        "session": state.session.status().await,
        "tools": state.session.tools().await.len(),
        "invocations": state.dispatcher.store().len(),
    }))
}
