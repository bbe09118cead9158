//! Payment bounded context.
//!
//! Owns payments and wallets. A wallet is created exactly once per user in
//! reaction to `user_created`; the order saga charges it through the
//! `ChargeWallet` activity, and an overdraft is the failure that triggers
//! saga compensation.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod testkit;

/// Source application id stamped on outbox rows.
pub const SOURCE_APP: &str = "payment-service";

/// Task queue served by this service's workflow worker.
pub const TASK_QUEUE: &str = "payment_task_queue";
