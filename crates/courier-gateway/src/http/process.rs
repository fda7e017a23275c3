//! POST /api/process: one user message in, one model reply out.
//!
//! Request:  `{"message": "read my latest email"}`
//! Response: `{"type": "message", "content": "..."}`
//!        or `{"type": "function_call", "explanation", "functionName", "executionId"}`
//! Error:    `{"type": "error", "error": "..."}`
//!
//! A directive is queued for execution and its id returned right away; the
//! result is fetched from `/api/function_result/{id}`.

use axum::{extract::State, Json};
use courier_agent::runtime::AgentReply;
use courier_core::error::CourierError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessReply {
    Message {
        content: String,
    },
    FunctionCall {
        explanation: String,
        #[serde(rename = "functionName")]
        function_name: String,
        #[serde(rename = "executionId")]
        execution_id: String,
    },
    Error {
        error: String,
    },
}

pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> Json<ProcessReply> {
    // An empty message is passed to the model as is.
    // The gateway is stateless: no history is carried between requests.
    let tools = state.session.tools().await;
    let reply = match state.agent.respond(&req.message, &[], &tools).await {
        Ok(AgentReply::Message(content)) => ProcessReply::Message { content },
        Ok(AgentReply::FunctionCall {
            explanation,
            directive,
        }) => {
            let function_name = directive.tool_name.clone();
            let id = state.dispatcher.submit(directive);
            ProcessReply::FunctionCall {
                explanation,
                function_name,
                execution_id: id.0,
            }
        }
        Err(e) => {
            let err = CourierError::LlmProvider(e.to_string());
            warn!(error = %err, code = err.code(), "POST /api/process failed");
            ProcessReply::Error {
                error: err.to_string(),
            }
        }
    };
    Json(reply)
}
