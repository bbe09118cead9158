//! User bounded context.
//!
//! Owns user identity: login (unique forever), optional contact details
//! (unique while present) and the Blocked / Active / Deleted lifecycle.
//! Publishes `user_created`, `user_updated` and `user_deleted` facts that
//! the payment and notification services fan out on.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod testkit;

/// Source application id stamped on outbox rows.
pub const SOURCE_APP: &str = "user-service";

/// Task queue served by this service's workflow worker.
pub const TASK_QUEUE: &str = "userservice_task_queue";
