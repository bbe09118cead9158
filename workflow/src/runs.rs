//! Durable workflow run records.
//!
//! Every start writes a run row before anything is dispatched; the row both
//! deduplicates workflow ids and lets a worker re-dispatch unfinished runs
//! after a crash.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::WorkflowError;
use crate::transport::WorkflowSubmission;

/// Lifecycle of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Recorded but not yet picked up by a worker.
    Pending,
    /// Executing on a worker.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl RunState {
    /// Stable string form used for persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the persisted form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the run still needs a worker.
    #[must_use]
    pub const fn is_unfinished(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// One recorded workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Caller-supplied workflow id (dedup key).
    pub workflow_id: String,
    /// Registered workflow name.
    pub workflow: String,
    /// Queue the run was submitted to.
    pub task_queue: String,
    /// JSON input.
    pub input: Value,
    /// Current lifecycle state.
    pub state: RunState,
    /// Failure message for failed runs.
    pub error: Option<String>,
    /// When the run was recorded.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRun {
    /// A fresh pending run.
    #[must_use]
    pub fn new(workflow_id: &str, workflow: &str, task_queue: &str, input: Value) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: workflow_id.to_string(),
            workflow: workflow.to_string(),
            task_queue: task_queue.to_string(),
            input,
            state: RunState::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The submission that re-dispatches this run.
    #[must_use]
    pub fn submission(&self) -> WorkflowSubmission {
        WorkflowSubmission {
            workflow_id: self.workflow_id.clone(),
            workflow: self.workflow.clone(),
            input: self.input.clone(),
        }
    }
}

/// Durable store of workflow runs.
#[async_trait]
pub trait WorkflowRunStore: Send + Sync {
    /// Insert a run unless its workflow id already exists.
    ///
    /// Returns `false` when the id is already recorded — the caller must
    /// then not dispatch a second run.
    async fn insert_new(&self, run: &WorkflowRun) -> Result<bool, WorkflowError>;

    /// Update the state of a run.
    async fn set_state(
        &self,
        workflow_id: &str,
        state: RunState,
        error: Option<String>,
    ) -> Result<(), WorkflowError>;

    /// Runs on a queue that still need a worker (pending or running).
    async fn unfinished(&self, task_queue: &str) -> Result<Vec<WorkflowRun>, WorkflowError>;

    /// Fetch one run by workflow id.
    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowRun>, WorkflowError>;
}

/// In-memory run store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryRunStore {
    runs: Mutex<HashMap<String, WorkflowRun>>,
}

impl InMemoryRunStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRunStore for InMemoryRunStore {
    async fn insert_new(&self, run: &WorkflowRun) -> Result<bool, WorkflowError> {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(&run.workflow_id) {
            return Ok(false);
        }
        runs.insert(run.workflow_id.clone(), run.clone());
        Ok(true)
    }

    async fn set_state(
        &self,
        workflow_id: &str,
        state: RunState,
        error: Option<String>,
    ) -> Result<(), WorkflowError> {
        let mut runs = self.runs.lock().await;
        if let Some(run) = runs.get_mut(workflow_id) {
            run.state = state;
            run.error = error;
            run.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn unfinished(&self, task_queue: &str) -> Result<Vec<WorkflowRun>, WorkflowError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .values()
            .filter(|run| run.task_queue == task_queue && run.state.is_unfinished())
            .cloned()
            .collect())
    }

    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowRun>, WorkflowError> {
        let runs = self.runs.lock().await;
        Ok(runs.get(workflow_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_is_idempotent_per_workflow_id() {
        let store = InMemoryRunStore::new();
        let run = WorkflowRun::new("wf-1", "Demo", "queue", Value::Null);

        assert!(store.insert_new(&run).await.expect("insert"));
        assert!(!store.insert_new(&run).await.expect("second insert"));
    }

    #[tokio::test]
    async fn unfinished_excludes_terminal_runs() {
        let store = InMemoryRunStore::new();
        store
            .insert_new(&WorkflowRun::new("wf-1", "Demo", "queue", Value::Null))
            .await
            .expect("insert");
        store
            .insert_new(&WorkflowRun::new("wf-2", "Demo", "queue", Value::Null))
            .await
            .expect("insert");
        store
            .set_state("wf-2", RunState::Completed, None)
            .await
            .expect("update");

        let unfinished = store.unfinished("queue").await.expect("query");
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].workflow_id, "wf-1");
    }
}
