//! Task-queue transports.
//!
//! A transport moves activity calls and workflow submissions between task
//! queues. [`InProcessTransport`] routes within one process — used by tests
//! and single-binary deployments; the AMQP crate implements the same trait
//! over broker queues for production.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::ActivityCall;
use crate::error::{ActivityError, WorkflowError};
use crate::worker::Worker;

/// A request to run a workflow on a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSubmission {
    /// Caller-supplied id; deduplicates starts.
    pub workflow_id: String,
    /// Registered workflow name.
    pub workflow: String,
    /// JSON input for the workflow.
    pub input: Value,
}

/// Moves calls and submissions to the worker that owns a queue.
#[async_trait]
pub trait TaskQueueTransport: Send + Sync {
    /// Invoke one activity attempt on a queue and await its result.
    async fn call_activity(&self, queue: &str, call: ActivityCall)
        -> Result<Value, ActivityError>;

    /// Hand a workflow submission to a queue's worker. Returns once the
    /// submission is accepted, not when the workflow finishes.
    async fn submit_workflow(
        &self,
        queue: &str,
        submission: WorkflowSubmission,
    ) -> Result<(), WorkflowError>;
}

/// In-process transport: a registry of workers keyed by queue name.
#[derive(Default)]
pub struct InProcessTransport {
    workers: RwLock<HashMap<String, Arc<Worker>>>,
}

impl InProcessTransport {
    /// Empty transport.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a worker to its queue.
    pub fn register(&self, worker: Arc<Worker>) {
        if let Ok(mut workers) = self.workers.write() {
            workers.insert(worker.queue().to_string(), worker);
        }
    }

    fn worker(&self, queue: &str) -> Option<Arc<Worker>> {
        self.workers.read().ok()?.get(queue).cloned()
    }
}

#[async_trait]
impl TaskQueueTransport for InProcessTransport {
    async fn call_activity(
        &self,
        queue: &str,
        call: ActivityCall,
    ) -> Result<Value, ActivityError> {
        let worker = self
            .worker(queue)
            .ok_or_else(|| ActivityError::Transport(format!("no worker on queue {queue}")))?;
        worker.handle_activity(call).await
    }

    async fn submit_workflow(
        &self,
        queue: &str,
        submission: WorkflowSubmission,
    ) -> Result<(), WorkflowError> {
        let worker = self
            .worker(queue)
            .ok_or_else(|| WorkflowError::Transport(format!("no worker on queue {queue}")))?;
        tokio::spawn(async move {
            worker.handle_submission(submission).await;
        });
        Ok(())
    }
}
