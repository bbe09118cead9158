//! Product bounded context.
//!
//! Owns the catalogue and available stock. Reservation is a conditional
//! decrement made idempotent per reservation key, so the order saga's
//! engine-driven retries can never double-reserve.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod testkit;

/// Source application id stamped on outbox rows.
pub const SOURCE_APP: &str = "product-service";

/// Task queue served by this service's workflow worker.
pub const TASK_QUEUE: &str = "product-task-queue";
