//! Workflow worker for the user task queue.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use emporium_workflow::{TaskQueueTransport, Worker, WorkflowRunStore};

use crate::TASK_QUEUE;

/// Build the user worker.
///
/// Currently registers only the `UserUpdatedWorkflow` placeholder; the
/// user service reacts to its own updates synchronously, so the workflow
/// just records the fact.
#[must_use]
pub fn build_worker(
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
) -> Worker {
    let mut worker = Worker::new(TASK_QUEUE, transport, runs);
    worker.register_workflow("UserUpdatedWorkflow", |_ctx, event: Value| async move {
        info!(%event, "user updated workflow");
        Ok(())
    });
    worker
}
