//! Durable workflow adapter: task queues, activities and workflows.
//!
//! Services coordinate long-running business transactions through this
//! crate rather than distributed transactions. The model follows the
//! classic durable-execution shape:
//!
//! - **Task queues** are named channels. Each owning service runs a
//!   [`Worker`] against its own queue and registers handlers there.
//! - **Activities** are side-effectful calls registered by **string name**,
//!   invoked with JSON in and JSON out, retried by the caller's
//!   [`RetryPolicy`] with a start-to-close timeout per attempt.
//! - **Workflows** are orchestrations registered by name. They receive a
//!   [`WorkflowContext`] to invoke activities on any queue and code their
//!   compensation explicitly — there is no automatic rollback.
//! - **Workflow ids** deduplicate starts: starting the same id twice
//!   returns the existing run instead of spawning a second one, which
//!   callers use for at-most-once saga initiation per aggregate.
//!
//! Durability is at-least-once: runs are recorded in a
//! [`runs::WorkflowRunStore`] before dispatch, and a worker re-dispatches
//! unfinished runs at startup. A crashed workflow therefore restarts from
//! the beginning, so activities must be idempotent.
//!
//! Transports are pluggable: [`transport::InProcessTransport`] wires queues
//! within one process (tests, single-binary deployments); the AMQP crate
//! provides the cross-service transport.

#![forbid(unsafe_code)]

pub mod activity;
pub mod client;
pub mod context;
pub mod error;
pub mod registry;
pub mod retry;
pub mod runs;
pub mod transport;
pub mod worker;

pub use activity::{ActivityCall, ActivityRegistry};
pub use client::{StartOutcome, WorkflowClient};
pub use context::WorkflowContext;
pub use error::{ActivityError, WorkflowError};
pub use registry::WorkflowRegistry;
pub use retry::RetryPolicy;
pub use runs::{InMemoryRunStore, RunState, WorkflowRun, WorkflowRunStore};
pub use transport::{InProcessTransport, TaskQueueTransport, WorkflowSubmission};
pub use worker::Worker;
