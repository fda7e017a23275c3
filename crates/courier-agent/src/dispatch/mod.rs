//! Asynchronous execution of directives.
//!
//! `submit` records a pending invocation and returns its id at once. A
//! bounded queue feeds a pool of at most `workers` concurrent jobs; each job
//! coerces the arguments, calls the tool and summarizes the result. Callers
//! poll the record by id until it reaches `completed` or `error`.

mod store;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use courier_core::config::DispatchConfig;
use courier_core::types::{Directive, Invocation, InvocationId};
use courier_mcp::ToolSession;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::summarize::Summarizer;
pub use store::InvocationStore;
use worker::{run_queue, Job, Worker};
pub use worker::TIMED_OUT;

/// Why an invocation ended in `error`. The display text is what callers see.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Session not initialized. Please wait for connection to establish.")]
    SessionNotReady,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameters for {tool}: {missing}")]
    MissingArguments { tool: String, missing: String },

    #[error("Error executing {tool}: {cause}")]
    Remote { tool: String, cause: String },

    #[error("Dispatch queue is full")]
    QueueFull,

    #[error("Dispatcher is not running")]
    Closed,
}

pub struct Dispatcher {
    store: Arc<InvocationStore>,
    queue: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Start the dispatch loop on the current tokio runtime.
    pub fn start(
        session: Arc<ToolSession>,
        summarizer: Arc<Summarizer>,
        config: &DispatchConfig,
    ) -> Self {
        let store = Arc::new(InvocationStore::new());
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        let worker = Arc::new(Worker {
            session,
            summarizer,
            store: store.clone(),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            gate: config.serialize_calls.then(|| Mutex::new(())),
        });
        tokio::spawn(run_queue(rx, worker, config.workers));

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            call_timeout_secs = config.call_timeout_secs,
            serialize_calls = config.serialize_calls,
            "dispatcher started"
        );
        Self { store, queue: tx }
    }

    /// Record a pending invocation and queue it. Never waits: a full queue
    /// ends the invocation in `error` right away.
    pub fn submit(&self, directive: Directive) -> InvocationId {
        let id = InvocationId::new();
        self.store
            .insert(Invocation::pending(id.clone(), directive.tool_name.clone()));
        info!(id = %id, tool = %directive.tool_name, "invocation queued");

        let job = Job {
            id: id.clone(),
            directive,
        };
        if let Err(e) = self.queue.try_send(job) {
            let err = match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
            };
            warn!(id = %id, error = %err, "invocation rejected");
            self.store.fail(&id, err.to_string());
        }
        id
    }

    pub fn lookup(&self, id: &InvocationId) -> Option<Invocation> {
        self.store.get(id)
    }

    /// Poll `id` every `interval` until it is terminal. `None` for unknown ids.
    pub async fn wait(&self, id: &InvocationId, interval: Duration) -> Option<Invocation> {
        loop {
            let record = self.lookup(id)?;
            if record.status.is_terminal() {
                return Some(record);
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub fn store(&self) -> &InvocationStore {
        &self.store
    }
}
