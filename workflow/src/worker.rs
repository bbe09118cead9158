//! Task-queue worker: executes activities and workflows for one queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::activity::{ActivityCall, ActivityRegistry};
use crate::context::WorkflowContext;
use crate::error::{ActivityError, WorkflowError};
use crate::registry::WorkflowRegistry;
use crate::retry::RetryPolicy;
use crate::runs::{RunState, WorkflowRunStore};
use crate::transport::{TaskQueueTransport, WorkflowSubmission};

/// Default activity start-to-close timeout.
pub const DEFAULT_START_TO_CLOSE: Duration = Duration::from_secs(60);

/// One service's worker against its own task queue.
///
/// Holds the activity and workflow registries for the queue plus the
/// transport used when its workflows call out to other queues. Transports
/// drive it: the in-process transport calls [`Worker::handle_activity`] /
/// [`Worker::handle_submission`] directly, the AMQP transport does so from
/// its consume loop.
pub struct Worker {
    queue: String,
    activities: ActivityRegistry,
    workflows: WorkflowRegistry,
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
    retry: RetryPolicy,
    start_to_close: Duration,
}

impl Worker {
    /// Worker for a queue, wired to a transport and run store.
    #[must_use]
    pub fn new(
        queue: impl Into<String>,
        transport: Arc<dyn TaskQueueTransport>,
        runs: Arc<dyn WorkflowRunStore>,
    ) -> Self {
        Self {
            queue: queue.into(),
            activities: ActivityRegistry::new(),
            workflows: WorkflowRegistry::new(),
            transport,
            runs,
            retry: RetryPolicy::default(),
            start_to_close: DEFAULT_START_TO_CLOSE,
        }
    }

    /// Override the retry policy used by this worker's workflows.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-attempt activity timeout.
    #[must_use]
    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = timeout;
        self
    }

    /// The queue this worker serves.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Register an activity handler by name.
    pub fn register_activity<I, O, F, Fut>(&mut self, name: &'static str, handler: F)
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ActivityError>> + Send + 'static,
    {
        self.activities.register(name, handler);
    }

    /// Register a workflow by name.
    pub fn register_workflow<I, F, Fut>(&mut self, name: &'static str, workflow: F)
    where
        I: DeserializeOwned + Send + 'static,
        F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WorkflowError>> + Send + 'static,
    {
        self.workflows.register(name, workflow);
    }

    /// Execute one activity call against this worker's registry.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error; one invocation is one attempt,
    /// retries belong to the caller.
    pub async fn handle_activity(&self, call: ActivityCall) -> Result<Value, ActivityError> {
        self.activities.invoke(call).await
    }

    /// Execute one workflow submission to completion, recording run state.
    pub async fn handle_submission(&self, submission: WorkflowSubmission) {
        let workflow_id = submission.workflow_id.clone();
        let Some(handler) = self.workflows.get(&submission.workflow) else {
            error!(
                queue = %self.queue,
                workflow = %submission.workflow,
                %workflow_id,
                "submission for unregistered workflow"
            );
            let _ = self
                .runs
                .set_state(
                    &workflow_id,
                    RunState::Failed,
                    Some(format!("workflow {} is not registered", submission.workflow)),
                )
                .await;
            return;
        };

        if let Err(err) = self
            .runs
            .set_state(&workflow_id, RunState::Running, None)
            .await
        {
            error!(%workflow_id, error = %err, "failed to mark run running");
        }

        let ctx = WorkflowContext::new(
            workflow_id.clone(),
            Arc::clone(&self.transport),
            self.queue.clone(),
            self.retry.clone(),
            self.start_to_close,
        );

        match handler(ctx, submission.input).await {
            Ok(()) => {
                info!(queue = %self.queue, %workflow_id, "workflow completed");
                if let Err(err) = self
                    .runs
                    .set_state(&workflow_id, RunState::Completed, None)
                    .await
                {
                    error!(%workflow_id, error = %err, "failed to mark run completed");
                }
            }
            Err(err) => {
                error!(queue = %self.queue, %workflow_id, error = %err, "workflow failed");
                let _ = self
                    .runs
                    .set_state(&workflow_id, RunState::Failed, Some(err.to_string()))
                    .await;
            }
        }
    }

    /// Re-dispatch unfinished runs recorded for this queue.
    ///
    /// Called at worker startup; a run interrupted by a crash restarts from
    /// the beginning, which is safe because activities are idempotent.
    ///
    /// # Errors
    ///
    /// Returns run-store failures; individual workflow failures are
    /// recorded on their runs, not returned.
    pub async fn resume_unfinished(self: &Arc<Self>) -> Result<usize, WorkflowError> {
        let unfinished = self.runs.unfinished(&self.queue).await?;
        let count = unfinished.len();
        for run in unfinished {
            info!(
                queue = %self.queue,
                workflow_id = %run.workflow_id,
                "resuming unfinished workflow run"
            );
            let worker = Arc::clone(self);
            let submission = run.submission();
            tokio::spawn(async move {
                worker.handle_submission(submission).await;
            });
        }
        Ok(count)
    }
}
