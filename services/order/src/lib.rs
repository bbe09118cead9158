//! Order bounded context.
//!
//! Owns orders and coordinates the purchase: storing an open order starts
//! the order saga, which reserves products, charges the customer's wallet
//! and drives the order to `Paid` — or compensates and cancels it.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod testkit;

/// Source application id stamped on outbox rows.
pub const SOURCE_APP: &str = "order-service";

/// Task queue served by this service's workflow worker. Also the saga's
/// coordinator queue.
pub const TASK_QUEUE: &str = "order_task_queue";

/// Task queue of the product service's worker.
pub const PRODUCT_TASK_QUEUE: &str = "product-task-queue";

/// Task queue of the payment service's worker.
pub const PAYMENT_TASK_QUEUE: &str = "payment_task_queue";
