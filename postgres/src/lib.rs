//! `PostgreSQL` infrastructure for the emporium services.
//!
//! Provides the production implementations of the kernel seams:
//!
//! - [`unit_of_work::PgUnitOfWork`] — transactions plus advisory named
//!   locks, one provider per bounded context;
//! - [`outbox`] — the transactional event outbox and the relay that
//!   publishes committed rows to the broker;
//! - [`migrate::Migrator`] — numbered schema migrations applied in order;
//! - [`runs::PgWorkflowRunStore`] — durable workflow run records.
//!
//! Repositories themselves live in each service's infrastructure module;
//! this crate only owns the cross-cutting pieces.

#![forbid(unsafe_code)]

pub mod migrate;
pub mod outbox;
pub mod runs;
pub mod unit_of_work;

pub use migrate::{Migration, Migrator};
pub use outbox::{OutboxRelay, OutboxRow};
pub use runs::PgWorkflowRunStore;
pub use unit_of_work::{PgTransaction, PgUnitOfWork, TxProvider};

use emporium_core::config::PostgresConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Open a connection pool from configuration.
///
/// # Errors
///
/// Returns the underlying `sqlx` error when the database is unreachable.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
}
