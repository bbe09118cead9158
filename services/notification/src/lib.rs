//! Notification bounded context.
//!
//! Keeps a local projection of users and records notifications to be sent.
//! Reacts to user lifecycle facts: `user_created` stores the projection and
//! welcomes the user, `user_updated` re-evaluates contact availability and
//! blocks users who lost every contact channel.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod testkit;

/// Source application id stamped on outbox rows.
pub const SOURCE_APP: &str = "notification-service";

/// Task queue served by this service's workflow worker.
pub const TASK_QUEUE: &str = "notification_task_queue";
