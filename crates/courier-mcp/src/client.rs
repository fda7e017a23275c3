//! Stdio MCP client: one child process, one JSON-RPC session.
//!
//! A reader task routes responses on stdout to the waiting request by id.
//! Server stderr is forwarded to the log and the last few lines are kept, so
//! a server that dies during startup ("credentials file not found") reports
//! why instead of a bare broken pipe.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use courier_core::config::ToolServerConfig;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{McpError, Result};
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ToolCallParams, ToolCallResult, ToolInfo, ToolListResult,
};

/// Lines of server stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;
/// How long to wait for the exit reason after the pipe breaks.
const EXIT_GRACE: Duration = Duration::from_secs(2);

type PendingMap = DashMap<u64, oneshot::Sender<JsonRpcResponse>>;
type StderrTail = Arc<StdMutex<VecDeque<String>>>;

pub struct McpClient {
    stdin: Mutex<ChildStdin>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    /// `Some(reason)` once the server's stdout has closed.
    exit: watch::Receiver<Option<String>>,
    reader: JoinHandle<()>,
    _child: Child,
}

impl McpClient {
    /// Launch the tool server described by `config`.
    ///
    /// The process is killed when the client is dropped.
    pub fn spawn(config: &ToolServerConfig) -> Result<Self> {
        info!(command = %config.command, args = ?config.args, "starting tool server");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::Transport(format!("failed to spawn '{}': {e}", config.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("tool server stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("tool server stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::Transport("tool server stderr not captured".into()))?;

        let tail: StderrTail = Arc::new(StdMutex::new(VecDeque::new()));
        let stderr_task = tokio::spawn(forward_stderr(stderr, tail.clone()));

        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let (exit_tx, exit_rx) = watch::channel(None);
        let reader = tokio::spawn(read_responses(
            stdout,
            pending.clone(),
            stderr_task,
            tail,
            exit_tx,
        ));

        Ok(Self {
            stdin: Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            exit: exit_rx,
            reader,
            _child: child,
        })
    }

    /// MCP handshake: `initialize` followed by `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let result = self.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)?;

        self.notify(JsonRpcNotification::new("notifications/initialized"))
            .await?;

        info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "tool server initialized"
        );
        Ok(init)
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let result = self.request("tools/list", None).await?;
        let list: ToolListResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let exited = self.exit.borrow().clone();
        if let Some(reason) = exited {
            return Err(McpError::ServerExited(reason));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        // Removes the entry if this future is dropped (e.g. by a deadline).
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        debug!(id, method, "sending request");
        self.write_line(&line).await?;

        let response = match rx.await {
            Ok(response) => response,
            Err(_) => return Err(self.closed_error().await),
        };

        if let Some(err) = response.error {
            return Err(McpError::Protocol(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol(format!("{method}: response carried no result")))
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<()> {
        let line = serde_json::to_string(&notification)?;
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(stdin);
                warn!(error = %e, "write to tool server failed");
                Err(self.closed_error().await)
            }
        }
    }

    /// Error for a request whose pipe went away. Prefers the server's own
    /// exit reason when it arrives within the grace period.
    async fn closed_error(&self) -> McpError {
        let mut exit = self.exit.clone();
        let err = match tokio::time::timeout(EXIT_GRACE, exit.wait_for(|reason| reason.is_some()))
            .await
        {
            Ok(Ok(reason)) => McpError::ServerExited((*reason).clone().unwrap_or_default()),
            _ => McpError::Transport("tool server connection closed".into()),
        };
        err
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

async fn read_responses(
    stdout: ChildStdout,
    pending: Arc<PendingMap>,
    stderr_task: JoinHandle<()>,
    tail: StderrTail,
    exit_tx: watch::Sender<Option<String>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => route_line(line.trim(), &pending),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "reading tool server output failed");
                break;
            }
        }
    }

    // Let stderr drain so the exit reason includes the server's last words.
    let _ = tokio::time::timeout(Duration::from_secs(1), stderr_task).await;

    let reason = {
        let tail = tail.lock().unwrap_or_else(|e| e.into_inner());
        if tail.is_empty() {
            "tool server closed its output stream".to_string()
        } else {
            tail.iter().cloned().collect::<Vec<_>>().join("\n")
        }
    };
    warn!(reason = %reason, "tool server session ended");

    let _ = exit_tx.send(Some(reason));
    // Dropping the senders wakes every waiting request.
    pending.clear();
}

fn route_line(line: &str, pending: &PendingMap) {
    if line.is_empty() {
        return;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, line, "ignoring non-JSON output from tool server");
            return;
        }
    };

    // Server-initiated requests and notifications are not used by Courier.
    if value.get("method").is_some() {
        debug!(message = %value, "ignoring server-initiated message");
        return;
    }

    let response: JsonRpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "malformed JSON-RPC response");
            return;
        }
    };

    match response.request_id() {
        Some(id) => match pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
            }
            None => debug!(id, "response for a request nobody is waiting on"),
        },
        None => warn!(error = ?response.error, "response without a usable id"),
    }
}

async fn forward_stderr(stderr: ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[tool server stderr] {}", line);
        let mut tail = tail.lock().unwrap_or_else(|e| e.into_inner());
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}
