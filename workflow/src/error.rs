//! Workflow and activity error types.

use emporium_core::DomainError;
use thiserror::Error;

/// Failure of a single activity attempt.
///
/// Activities surface every error to the caller; retrying is the caller's
/// concern and applies to any returned error until attempts run out.
#[derive(Error, Debug, Clone)]
pub enum ActivityError {
    /// The activity ran and failed (business or infrastructure).
    #[error("{0}")]
    Application(String),

    /// No handler registered under the requested name.
    #[error("activity {0} is not registered")]
    NotRegistered(String),

    /// The attempt exceeded its start-to-close timeout.
    #[error("activity attempt timed out")]
    Timeout,

    /// The task-queue transport failed before the handler ran.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<DomainError> for ActivityError {
    fn from(err: DomainError) -> Self {
        Self::Application(err.to_string())
    }
}

/// Failure of a workflow or of the engine around it.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// An activity kept failing until its attempts were exhausted; the
    /// workflow sees only this final outcome.
    #[error("activity {name} failed after {attempts} attempts: {source}")]
    ActivityFailed {
        /// Activity name.
        name: String,
        /// Attempts made.
        attempts: u32,
        /// Last attempt's error.
        source: ActivityError,
    },

    /// No workflow registered under the requested name.
    #[error("workflow {0} is not registered")]
    UnknownWorkflow(String),

    /// Input or output could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The task-queue transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The run store failed.
    #[error("run store error: {0}")]
    RunStore(String),
}
