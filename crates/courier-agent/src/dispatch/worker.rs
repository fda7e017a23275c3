use std::sync::Arc;
use std::time::Duration;

use courier_core::types::{ArgumentMap, Directive, InvocationId};
use courier_mcp::session::Connected;
use courier_mcp::ToolSession;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{info, warn};

use super::store::InvocationStore;
use super::DispatchError;
use crate::coerce::coerce_arguments;
use crate::summarize::Summarizer;

/// Raw result recorded when a remote call misses its deadline.
pub const TIMED_OUT: &str = "Operation timed out";

pub(crate) struct Job {
    pub id: InvocationId,
    pub directive: Directive,
}

/// Executes one directive against the tool session.
pub(crate) struct Worker {
    pub session: Arc<ToolSession>,
    pub summarizer: Arc<Summarizer>,
    pub store: Arc<InvocationStore>,
    pub call_timeout: Duration,
    /// Held across each remote call when calls are serialized.
    pub gate: Option<Mutex<()>>,
}

/// Drain `jobs`, running at most `workers` of them at once.
pub(crate) async fn run_queue(mut jobs: mpsc::Receiver<Job>, worker: Arc<Worker>, workers: usize) {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let worker = worker.clone();
        tokio::spawn(async move {
            worker.execute(job).await;
            drop(permit);
        });
    }
    info!("dispatch queue closed");
}

impl Worker {
    pub async fn execute(&self, job: Job) {
        self.store.mark_processing(&job.id);

        match self.run(&job.id, &job.directive).await {
            Ok((raw, summary)) => {
                info!(id = %job.id, tool = %job.directive.tool_name, "invocation completed");
                self.store.complete(&job.id, raw, summary);
            }
            Err(e) => {
                warn!(id = %job.id, tool = %job.directive.tool_name, error = %e, "invocation failed");
                self.store.fail(&job.id, e.to_string());
            }
        }
    }

    async fn run(
        &self,
        id: &InvocationId,
        directive: &Directive,
    ) -> Result<(String, String), DispatchError> {
        // The catalog is empty until connected, so an early directive names
        // the unknown tool rather than the missing session.
        let connected = self.session.connected().await;
        let tool = connected
            .as_ref()
            .and_then(|c| c.find_tool(&directive.tool_name))
            .cloned()
            .ok_or_else(|| DispatchError::UnknownTool(directive.tool_name.clone()))?;
        let connected = connected.ok_or(DispatchError::SessionNotReady)?;

        let coerced = coerce_arguments(&tool.parameters, &directive.raw_arguments);
        self.store.record_arguments(id, coerced.arguments.clone());
        let missing = coerced.missing_required(&tool.parameters);
        if !missing.is_empty() {
            return Err(DispatchError::MissingArguments {
                tool: tool.name.clone(),
                missing: missing.join(", "),
            });
        }

        let raw = self
            .call(&connected, &tool.name, coerced.arguments.clone())
            .await?;
        let summary = self
            .summarizer
            .summarize(&tool.name, &coerced.arguments, &raw)
            .await;
        Ok((raw, summary))
    }

    async fn call(
        &self,
        connected: &Connected,
        tool: &str,
        arguments: ArgumentMap,
    ) -> Result<String, DispatchError> {
        let _gate = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let call = connected.provider.call_tool(tool, arguments);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(output)) => {
                if output.is_error {
                    warn!(tool, "tool reported an error result");
                }
                Ok(output.to_text())
            }
            Ok(Err(e)) => Err(DispatchError::Remote {
                tool: tool.to_string(),
                cause: e.to_string(),
            }),
            Err(_) => {
                warn!(tool, timeout_secs = self.call_timeout.as_secs(), "tool call timed out");
                Ok(TIMED_OUT.to_string())
            }
        }
    }
}
