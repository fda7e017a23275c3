//! POST /api/initialize: start (or report on) the tool server session.
//!
//! The first call starts connecting in the background and returns at once;
//! callers keep calling until they see success or an error.
//!
//! Response: `{"success": true, "message": "...", "toolCount": 0}`
//! Error:    `{"success": false, "error": "..."}`

use axum::{extract::State, Json};
use courier_mcp::InitStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InitializeReply {
    Ok {
        success: bool,
        message: &'static str,
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl InitializeReply {
    fn ok(message: &'static str, tool_count: usize) -> Self {
        InitializeReply::Ok {
            success: true,
            message,
            tool_count,
        }
    }
}

impl From<InitStatus> for InitializeReply {
    fn from(status: InitStatus) -> Self {
        match status {
            InitStatus::NotStarted | InitStatus::InProgress => {
                InitializeReply::ok("Initialization in progress", 0)
            }
            InitStatus::Success { tool_count } => {
                InitializeReply::ok("Already initialized", tool_count)
            }
            InitStatus::Failed { error } => InitializeReply::Failed {
                success: false,
                error,
            },
        }
    }
}

pub async fn initialize_handler(State(state): State<Arc<AppState>>) -> Json<InitializeReply> {
    if state.start_session().await {
        return Json(InitializeReply::ok("Initialization started", 0));
    }
    Json(state.session.status().await.into())
}
