//! Tool-provider session: the one connection to the tool server, its tool
//! catalog, and the initialization status shown to callers.
//!
//! Owned by whoever builds the application state and handed to the
//! dispatcher by `Arc`.

use std::sync::Arc;
use std::time::Duration;

use courier_core::config::ToolServerConfig;
use courier_core::types::ToolDescriptor;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::client::McpClient;
use crate::error::McpError;
use crate::provider::ToolProvider;

/// Initialization status as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Success { tool_count: usize },
    Failed { error: String },
}

/// A live session: the provider handle plus the catalog it reported.
pub struct Connected {
    pub provider: Arc<dyn ToolProvider>,
    pub tools: Vec<ToolDescriptor>,
}

impl Connected {
    pub fn find_tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

enum SessionState {
    NotStarted,
    Connecting,
    Ready(Arc<Connected>),
    Failed(String),
}

pub struct ToolSession {
    state: RwLock<SessionState>,
}

impl Default for ToolSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSession {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::NotStarted),
        }
    }

    pub async fn status(&self) -> InitStatus {
        match &*self.state.read().await {
            SessionState::NotStarted => InitStatus::NotStarted,
            SessionState::Connecting => InitStatus::InProgress,
            SessionState::Ready(connected) => InitStatus::Success {
                tool_count: connected.tools.len(),
            },
            SessionState::Failed(error) => InitStatus::Failed {
                error: error.clone(),
            },
        }
    }

    /// Claim the right to connect. Returns `true` only for the first caller;
    /// later calls see the session already in progress (or finished).
    pub async fn begin(&self) -> bool {
        let mut state = self.state.write().await;
        if matches!(*state, SessionState::NotStarted) {
            *state = SessionState::Connecting;
            true
        } else {
            false
        }
    }

    /// The live session, or `None` while not (or never) connected.
    pub async fn connected(&self) -> Option<Arc<Connected>> {
        match &*self.state.read().await {
            SessionState::Ready(connected) => Some(connected.clone()),
            _ => None,
        }
    }

    /// Snapshot of the tool catalog. Empty until connected.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.connected()
            .await
            .map(|c| c.tools.clone())
            .unwrap_or_default()
    }

    /// Spawn the tool server, run the MCP handshake and load the catalog,
    /// all under `connect_timeout_secs`. Failures end in `InitStatus::Failed`
    /// with a human-readable cause; they never propagate further.
    pub async fn connect(&self, config: &ToolServerConfig) -> InitStatus {
        *self.state.write().await = SessionState::Connecting;

        let secs = config.connect_timeout_secs;
        let attempt = async {
            let client = McpClient::spawn(config)?;
            client.initialize().await?;
            let tools = ToolProvider::list_tools(&client).await?;
            Ok::<_, McpError>((client, tools))
        };

        match tokio::time::timeout(Duration::from_secs(secs), attempt).await {
            Ok(Ok((client, tools))) => self.install(Arc::new(client), tools).await,
            Ok(Err(e)) => self.fail(&e.to_string()).await,
            Err(_) => {
                self.fail(&format!("timed out after {secs}s connecting to tool server"))
                    .await
            }
        }
        self.status().await
    }

    /// Adopt an already-connected provider and load its catalog.
    pub async fn attach(&self, provider: Arc<dyn ToolProvider>) -> InitStatus {
        *self.state.write().await = SessionState::Connecting;
        match provider.list_tools().await {
            Ok(tools) => self.install(provider, tools).await,
            Err(e) => self.fail(&e.to_string()).await,
        }
        self.status().await
    }

    async fn install(&self, provider: Arc<dyn ToolProvider>, tools: Vec<ToolDescriptor>) {
        info!(
            provider = provider.name(),
            tools = tools.len(),
            "tool session ready"
        );
        *self.state.write().await = SessionState::Ready(Arc::new(Connected { provider, tools }));
    }

    async fn fail(&self, raw: &str) {
        let message = classify_init_error(raw);
        error!(error = %raw, "tool session initialization failed");
        *self.state.write().await = SessionState::Failed(message);
    }
}

/// Map a raw setup failure to a cause the user can act on. Unrecognized
/// errors pass through verbatim.
pub fn classify_init_error(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("credentials file not found") {
        "Gmail credentials file not found. Please create a 'gmail_cred.json' file with your \
         OAuth 2.0 credentials in the project root directory."
            .to_string()
    } else if lower.contains("invalid_grant") {
        "Invalid authentication credentials. Your OAuth token may have expired. \
         Delete the token.json file and try again."
            .to_string()
    } else if lower.contains("access_denied") {
        "Access denied. You need to authorize the application to access your Gmail account."
            .to_string()
    } else {
        raw.to_string()
    }
}
