//! GET /api/function_result/{id}: poll one invocation.
//!
//! `{"status": "pending"}` and `{"status": "processing"}` while running, then
//! `{"status": "completed", "functionName", "rawResult", "processedResult"}`
//! or `{"status": "error", "functionName", "error"}`. Unknown ids are 404.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use courier_core::error::CourierError;
use courier_core::types::{Invocation, InvocationId, InvocationStatus};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;

pub async fn function_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let id = InvocationId(id);
    match state.dispatcher.lookup(&id) {
        Some(invocation) => Ok(Json(render(&invocation))),
        None => {
            debug!(id = %id, "poll for unknown invocation");
            let err = CourierError::InvocationNotFound { id: id.0 };
            Err((
                StatusCode::NOT_FOUND,
                Json(json!({
                    "status": "error",
                    "error": err.to_string(),
                    "code": err.code(),
                })),
            ))
        }
    }
}

fn render(invocation: &Invocation) -> Value {
    match invocation.status {
        InvocationStatus::Pending | InvocationStatus::Processing => {
            json!({ "status": invocation.status })
        }
        InvocationStatus::Completed => json!({
            "status": "completed",
            "functionName": invocation.tool_name,
            "rawResult": invocation.raw_result.as_deref().unwrap_or_default(),
            "processedResult": invocation.summarized_result.as_deref().unwrap_or_default(),
        }),
        InvocationStatus::Error => json!({
            "status": "error",
            "functionName": invocation.tool_name,
            "error": invocation.error_message.as_deref().unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_records_only_report_status() {
        let mut invocation = Invocation::pending(InvocationId::new(), "read-unread");
        assert_eq!(render(&invocation), json!({"status": "pending"}));
        invocation.status = InvocationStatus::Processing;
        assert_eq!(render(&invocation), json!({"status": "processing"}));
    }

    #[test]
    fn completed_record_carries_both_results() {
        let mut invocation = Invocation::pending(InvocationId::new(), "read-unread");
        invocation.status = InvocationStatus::Completed;
        invocation.raw_result = Some("raw\n".into());
        invocation.summarized_result = Some("nice".into());
        assert_eq!(
            render(&invocation),
            json!({
                "status": "completed",
                "functionName": "read-unread",
                "rawResult": "raw\n",
                "processedResult": "nice",
            })
        );
    }
}
