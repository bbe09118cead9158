//! Workflow execution context.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::activity::ActivityCall;
use crate::error::{ActivityError, WorkflowError};
use crate::retry::RetryPolicy;
use crate::transport::TaskQueueTransport;

/// Handle given to a running workflow for invoking activities.
///
/// Activities are addressed by queue and string name. Each invocation is
/// retried per the context's [`RetryPolicy`] with a start-to-close timeout
/// per attempt; the workflow sees only the final outcome.
#[derive(Clone)]
pub struct WorkflowContext {
    /// Id of the running workflow.
    pub workflow_id: String,
    transport: Arc<dyn TaskQueueTransport>,
    default_queue: String,
    retry: RetryPolicy,
    start_to_close: Duration,
}

impl WorkflowContext {
    /// Build a context bound to a transport and a coordinator queue.
    #[must_use]
    pub fn new(
        workflow_id: String,
        transport: Arc<dyn TaskQueueTransport>,
        default_queue: String,
        retry: RetryPolicy,
        start_to_close: Duration,
    ) -> Self {
        Self {
            workflow_id,
            transport,
            default_queue,
            retry,
            start_to_close,
        }
    }

    /// Invoke an activity on the coordinator's own queue.
    ///
    /// # Errors
    ///
    /// See [`WorkflowContext::execute_activity`].
    pub async fn execute<I, O>(&self, activity: &str, input: &I) -> Result<O, WorkflowError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let queue = self.default_queue.clone();
        self.execute_activity(&queue, activity, input).await
    }

    /// Invoke an activity on an explicit task queue.
    ///
    /// Retries any error until the policy's attempts are exhausted. Each
    /// attempt is bounded by the start-to-close timeout.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::ActivityFailed`] with the last attempt's error once
    /// retries run out, or [`WorkflowError::Serialization`] for
    /// input/output encoding failures.
    pub async fn execute_activity<I, O>(
        &self,
        queue: &str,
        activity: &str,
        input: &I,
    ) -> Result<O, WorkflowError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let input =
            serde_json::to_value(input).map_err(|e| WorkflowError::Serialization(e.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let call = ActivityCall::new(activity, input.clone());
            let outcome = match tokio::time::timeout(
                self.start_to_close,
                self.transport.call_activity(queue, call),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ActivityError::Timeout),
            };

            match outcome {
                Ok(value) => {
                    return serde_json::from_value(value)
                        .map_err(|e| WorkflowError::Serialization(e.to_string()));
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after_attempt(attempt);
                    warn!(
                        workflow_id = %self.workflow_id,
                        %activity,
                        %queue,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "activity attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(WorkflowError::ActivityFailed {
                        name: activity.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}
