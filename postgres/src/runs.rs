//! Postgres-backed workflow run store.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use emporium_workflow::error::WorkflowError;
use emporium_workflow::runs::{RunState, WorkflowRun, WorkflowRunStore};

/// Schema of the workflow run table.
pub const WORKFLOW_RUNS_MIGRATION: &str = r"
CREATE TABLE IF NOT EXISTS workflow_runs (
    workflow_id text PRIMARY KEY,
    workflow text NOT NULL,
    task_queue text NOT NULL,
    input jsonb NOT NULL,
    state text NOT NULL,
    error text,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL
);
CREATE INDEX IF NOT EXISTS workflow_runs_unfinished_idx
    ON workflow_runs (task_queue) WHERE state IN ('pending', 'running');
";

/// Durable run records in the service's own database.
///
/// The primary key on `workflow_id` is what makes `start_workflow`
/// idempotent: a second start hits the conflict and is dropped.
pub struct PgWorkflowRunStore {
    pool: PgPool,
}

impl PgWorkflowRunStore {
    /// Store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(err: sqlx::Error) -> WorkflowError {
    WorkflowError::RunStore(err.to_string())
}

#[async_trait]
impl WorkflowRunStore for PgWorkflowRunStore {
    async fn insert_new(&self, run: &WorkflowRun) -> Result<bool, WorkflowError> {
        let result = sqlx::query(
            "INSERT INTO workflow_runs
                (workflow_id, workflow, task_queue, input, state, error, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (workflow_id) DO NOTHING",
        )
        .bind(&run.workflow_id)
        .bind(&run.workflow)
        .bind(&run.task_queue)
        .bind(&run.input)
        .bind(run.state.as_str())
        .bind(&run.error)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_state(
        &self,
        workflow_id: &str,
        state: RunState,
        error: Option<String>,
    ) -> Result<(), WorkflowError> {
        sqlx::query(
            "UPDATE workflow_runs SET state = $2, error = $3, updated_at = now()
             WHERE workflow_id = $1",
        )
        .bind(workflow_id)
        .bind(state.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn unfinished(&self, task_queue: &str) -> Result<Vec<WorkflowRun>, WorkflowError> {
        let rows = sqlx::query(
            "SELECT workflow_id, workflow, task_queue, input, state, error,
                    created_at, updated_at
             FROM workflow_runs
             WHERE task_queue = $1 AND state IN ('pending', 'running')
             ORDER BY created_at",
        )
        .bind(task_queue)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(|row| row_to_run(&row)).collect()
    }

    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowRun>, WorkflowError> {
        let row = sqlx::query(
            "SELECT workflow_id, workflow, task_queue, input, state, error,
                    created_at, updated_at
             FROM workflow_runs WHERE workflow_id = $1",
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(|row| row_to_run(&row)).transpose()
    }
}

fn row_to_run(row: &sqlx::postgres::PgRow) -> Result<WorkflowRun, WorkflowError> {
    let state: String = row.try_get("state").map_err(store_err)?;
    let state = RunState::parse(&state)
        .ok_or_else(|| WorkflowError::RunStore(format!("unknown run state {state}")))?;
    Ok(WorkflowRun {
        workflow_id: row.try_get("workflow_id").map_err(store_err)?,
        workflow: row.try_get("workflow").map_err(store_err)?,
        task_queue: row.try_get("task_queue").map_err(store_err)?,
        input: row.try_get("input").map_err(store_err)?,
        state,
        error: row.try_get("error").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
        updated_at: row.try_get("updated_at").map_err(store_err)?,
    })
}
