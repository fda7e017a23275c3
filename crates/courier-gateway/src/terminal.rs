//! `courier chat`: interactive terminal front-end.
//!
//! Unlike the HTTP gateway, the chat keeps the whole conversation and passes
//! it to the model on every turn, including the system notes recorded while
//! a tool runs.

use std::sync::Arc;
use std::time::Duration;

use courier_agent::prompt::{Speaker, Turn};
use courier_agent::runtime::AgentReply;
use courier_core::types::{Invocation, InvocationStatus};
use serde_json::Value;
use courier_mcp::InitStatus;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::app::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct ChatLoop {
    state: Arc<AppState>,
    history: Vec<Turn>,
    poll: Duration,
}

impl ChatLoop {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            history: Vec::new(),
            poll: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Connect to the tool server and record the outcome as a system turn.
    pub async fn connect(&mut self) -> Turn {
        let status = if self.state.session.begin().await {
            self.state
                .session
                .connect(&self.state.config.tool_server)
                .await
        } else {
            self.state.session.status().await
        };

        let note = match status {
            InitStatus::Success { tool_count } => {
                format!("Ready - Connected with {tool_count} available tools")
            }
            InitStatus::Failed { error } => format!("Failed to connect to email server: {error}"),
            InitStatus::NotStarted | InitStatus::InProgress => {
                "Connection to email server still in progress".to_string()
            }
        };
        self.record(Speaker::System, note)
    }

    /// Run one user message to completion, including any tool call and its
    /// summary. Returns the turns added to the conversation.
    pub async fn handle(&mut self, message: &str) -> Vec<Turn> {
        let start = self.history.len();
        let prior = self.history.clone();
        self.record(Speaker::User, message);

        let tools = self.state.session.tools().await;
        match self.state.agent.respond(message, &prior, &tools).await {
            Ok(AgentReply::Message(text)) => {
                self.record(Speaker::Assistant, text);
            }
            Ok(AgentReply::FunctionCall {
                explanation,
                directive,
            }) => {
                if !explanation.is_empty() {
                    self.record(Speaker::Assistant, explanation);
                }
                let tool = directive.tool_name.clone();
                self.record(Speaker::System, format!("Executing: {tool}"));

                let id = self.state.dispatcher.submit(directive);
                match self.state.dispatcher.wait(&id, self.poll).await {
                    Some(inv) if inv.status == InvocationStatus::Completed => {
                        self.note_arguments(&inv);
                        self.record(
                            Speaker::System,
                            format!(
                                "Result from {tool}:\n{}",
                                inv.raw_result.unwrap_or_default()
                            ),
                        );
                        self.record(Speaker::Assistant, inv.summarized_result.unwrap_or_default());
                    }
                    Some(inv) => {
                        self.note_arguments(&inv);
                        self.record(Speaker::System, inv.error_message.unwrap_or_default());
                    }
                    None => {
                        warn!(id = %id, "invocation vanished from the store");
                    }
                }
            }
            Err(e) => {
                self.record(Speaker::System, format!("Error: {e}"));
            }
        }

        self.history[start + 1..].to_vec()
    }

    fn note_arguments(&mut self, inv: &Invocation) {
        if let Some(arguments) = &inv.arguments {
            self.record(
                Speaker::System,
                format!("Calling tool with arguments: {}", Value::Object(arguments.clone())),
            );
        }
    }

    fn record(&mut self, sender: Speaker, message: impl Into<String>) -> Turn {
        let turn = Turn::new(sender, message);
        self.history.push(turn.clone());
        turn
    }
}

/// Read lines from stdin until EOF or `exit`/`quit`.
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut chat = ChatLoop::new(state);
    let mut stdout = tokio::io::stdout();

    stdout
        .write_all(b"Courier email assistant. Type 'exit' or 'quit' to leave.\n")
        .await?;
    stdout.write_all(b"Connecting to email server...\n").await?;
    let note = chat.connect().await;
    print_turn(&mut stdout, &note).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        for turn in chat.handle(input).await {
            print_turn(&mut stdout, &turn).await?;
        }
    }

    stdout.write_all(b"Goodbye!\n").await?;
    stdout.flush().await?;
    Ok(())
}

async fn print_turn(stdout: &mut tokio::io::Stdout, turn: &Turn) -> std::io::Result<()> {
    stdout
        .write_all(format!("\n{}: {}\n", turn.sender, turn.message).as_bytes())
        .await?;
    stdout.flush().await
}
