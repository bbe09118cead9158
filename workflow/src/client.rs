//! Client for starting workflows.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::WorkflowError;
use crate::runs::{WorkflowRun, WorkflowRunStore};
use crate::transport::{TaskQueueTransport, WorkflowSubmission};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new run was recorded and dispatched.
    Started,
    /// A run with this workflow id already exists; nothing was dispatched.
    AlreadyStarted,
}

/// Starts workflows on task queues with id-based deduplication.
#[derive(Clone)]
pub struct WorkflowClient {
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
}

impl WorkflowClient {
    /// Client over a transport and run store.
    #[must_use]
    pub fn new(transport: Arc<dyn TaskQueueTransport>, runs: Arc<dyn WorkflowRunStore>) -> Self {
        Self { transport, runs }
    }

    /// Start a workflow, deduplicating on the workflow id.
    ///
    /// The run row is written before dispatch, so a crash between the two
    /// leaves a pending run that the owning worker re-dispatches at
    /// startup. A second start with the same id returns
    /// [`StartOutcome::AlreadyStarted`] without dispatching.
    ///
    /// # Errors
    ///
    /// Run-store, serialization or transport failures.
    pub async fn start_workflow<I: Serialize + Sync>(
        &self,
        queue: &str,
        workflow: &str,
        workflow_id: &str,
        input: &I,
    ) -> Result<StartOutcome, WorkflowError> {
        let input =
            serde_json::to_value(input).map_err(|e| WorkflowError::Serialization(e.to_string()))?;

        let run = WorkflowRun::new(workflow_id, workflow, queue, input);
        if !self.runs.insert_new(&run).await? {
            info!(%workflow_id, %workflow, "workflow already started, skipping");
            return Ok(StartOutcome::AlreadyStarted);
        }

        let submission = WorkflowSubmission {
            workflow_id: workflow_id.to_string(),
            workflow: workflow.to_string(),
            input: run.input,
        };
        self.transport.submit_workflow(queue, submission).await?;
        info!(%workflow_id, %workflow, %queue, "workflow started");
        Ok(StartOutcome::Started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkflowContext;
    use crate::runs::{InMemoryRunStore, RunState};
    use crate::transport::InProcessTransport;
    use crate::worker::Worker;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn wait_for_state(
        runs: &InMemoryRunStore,
        workflow_id: &str,
        state: RunState,
    ) -> bool {
        use crate::runs::WorkflowRunStore as _;
        for _ in 0..100 {
            if let Ok(Some(run)) = runs.get(workflow_id).await {
                if run.state == state {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn start_is_deduplicated_by_workflow_id() {
        let transport = InProcessTransport::new();
        let runs = Arc::new(InMemoryRunStore::new());

        let executions = Arc::new(AtomicUsize::new(0));
        let executions_clone = Arc::clone(&executions);

        let mut worker = Worker::new(
            "test-queue",
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );
        worker.register_workflow("Demo", move |_ctx, _input: Value| {
            let executions = Arc::clone(&executions_clone);
            async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        transport.register(Arc::new(worker));

        let client = WorkflowClient::new(
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );

        let first = client
            .start_workflow("test-queue", "Demo", "demo-1", &Value::Null)
            .await
            .expect("start");
        assert_eq!(first, StartOutcome::Started);

        let second = client
            .start_workflow("test-queue", "Demo", "demo-1", &Value::Null)
            .await
            .expect("second start");
        assert_eq!(second, StartOutcome::AlreadyStarted);

        assert!(wait_for_state(&runs, "demo-1", RunState::Completed).await);
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_workflow_is_recorded_with_error() {
        let transport = InProcessTransport::new();
        let runs = Arc::new(InMemoryRunStore::new());

        let mut worker = Worker::new(
            "test-queue",
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );
        worker.register_workflow("Broken", |_ctx, _input: Value| async move {
            Err(WorkflowError::Transport("downstream is gone".into()))
        });
        transport.register(Arc::new(worker));

        let client = WorkflowClient::new(
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );
        client
            .start_workflow("test-queue", "Broken", "broken-1", &Value::Null)
            .await
            .expect("start");

        assert!(wait_for_state(&runs, "broken-1", RunState::Failed).await);
        use crate::runs::WorkflowRunStore as _;
        let run = runs.get("broken-1").await.expect("get").expect("exists");
        assert!(run.error.as_deref().is_some_and(|e| e.contains("downstream")));
    }

    #[tokio::test]
    async fn workflow_invokes_activity_on_another_queue_with_retries() {
        let transport = InProcessTransport::new();
        let runs = Arc::new(InMemoryRunStore::new());

        // Remote queue whose activity fails twice, then succeeds.
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let mut remote = Worker::new(
            "remote-queue",
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );
        remote.register_activity("Flaky", move |_: Value| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(crate::error::ActivityError::Application("flaky".into()))
                } else {
                    Ok(41)
                }
            }
        });
        transport.register(Arc::new(remote));

        let mut coordinator = Worker::new(
            "coordinator-queue",
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        )
        .with_retry_policy(
            crate::retry::RetryPolicy::default()
                .with_initial_delay(Duration::from_millis(1)),
        );
        coordinator.register_workflow("CallsRemote", |ctx: WorkflowContext, _: Value| async move {
            let value: i64 = ctx.execute_activity("remote-queue", "Flaky", &Value::Null).await?;
            assert_eq!(value, 41);
            Ok(())
        });
        transport.register(Arc::new(coordinator));

        let client = WorkflowClient::new(
            transport.clone() as Arc<dyn TaskQueueTransport>,
            runs.clone() as Arc<dyn WorkflowRunStore>,
        );
        client
            .start_workflow("coordinator-queue", "CallsRemote", "calls-remote-1", &Value::Null)
            .await
            .expect("start");

        assert!(wait_for_state(&runs, "calls-remote-1", RunState::Completed).await);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
