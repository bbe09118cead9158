//! Transactional event outbox and its relay.
//!
//! Dispatch does not touch the broker inline: the application appends a row
//! to the service's `outbox` table inside the business transaction, and the
//! relay tails unsent rows after commit, publishes them and marks them
//! sent. A domain event is therefore observable by subscribers only after
//! its producing transaction committed, and a rollback publishes nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use uuid::Uuid;

use emporium_core::bus::EventBus;
use emporium_core::error::DomainError;
use emporium_core::event::EventEnvelope;

/// Transport discriminator stored on every row.
pub const TRANSPORT_AMQP: &str = "amqp";

/// Schema of the per-service outbox table.
pub const OUTBOX_MIGRATION: &str = r"
CREATE TABLE IF NOT EXISTS outbox (
    id uuid PRIMARY KEY,
    aggregate_type text NOT NULL,
    aggregate_id uuid NOT NULL,
    type text NOT NULL,
    routing_key text NOT NULL,
    correlation_id text,
    payload jsonb NOT NULL,
    transport text NOT NULL,
    source_app text NOT NULL,
    created_at timestamptz NOT NULL,
    sent_at timestamptz
);
CREATE INDEX IF NOT EXISTS outbox_unsent_idx ON outbox (created_at) WHERE sent_at IS NULL;
";

/// One outbox row.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    /// Row and envelope id.
    pub id: Uuid,
    /// Aggregate kind of the producing operation.
    pub aggregate_type: String,
    /// Aggregate identity.
    pub aggregate_id: Uuid,
    /// Event type discriminator.
    pub event_type: String,
    /// Broker routing key.
    pub routing_key: String,
    /// Correlation id, if any.
    pub correlation_id: Option<String>,
    /// Event payload.
    pub payload: serde_json::Value,
    /// When the producing transaction wrote the row.
    pub created_at: DateTime<Utc>,
}

impl OutboxRow {
    /// Rebuild the envelope this row was written from.
    #[must_use]
    pub fn envelope(&self) -> EventEnvelope {
        EventEnvelope {
            id: self.id,
            event_type: self.event_type.clone(),
            aggregate_type: self.aggregate_type.clone(),
            aggregate_id: self.aggregate_id,
            correlation_id: self.correlation_id.clone(),
            routing_key: self.routing_key.clone(),
            payload: self.payload.clone(),
            occurred_at: self.created_at,
        }
    }
}

/// Append an envelope to the outbox within the ambient transaction.
///
/// # Errors
///
/// Returns [`DomainError::Internal`] on database failure.
pub async fn append(
    conn: &mut PgConnection,
    source_app: &str,
    envelope: &EventEnvelope,
) -> Result<(), DomainError> {
    sqlx::query(
        "INSERT INTO outbox
            (id, aggregate_type, aggregate_id, type, routing_key, correlation_id,
             payload, transport, source_app, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(envelope.id)
    .bind(&envelope.aggregate_type)
    .bind(envelope.aggregate_id)
    .bind(&envelope.event_type)
    .bind(&envelope.routing_key)
    .bind(&envelope.correlation_id)
    .bind(&envelope.payload)
    .bind(TRANSPORT_AMQP)
    .bind(source_app)
    .bind(envelope.occurred_at)
    .execute(conn)
    .await
    .map_err(DomainError::internal)?;
    Ok(())
}

/// Fetch unsent rows in creation order.
///
/// # Errors
///
/// Returns the underlying `sqlx` error.
pub async fn fetch_unsent(pool: &PgPool, limit: i64) -> Result<Vec<OutboxRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, aggregate_type, aggregate_id, type, routing_key, correlation_id,
                payload, created_at
         FROM outbox WHERE sent_at IS NULL ORDER BY created_at LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(OutboxRow {
                id: row.try_get("id")?,
                aggregate_type: row.try_get("aggregate_type")?,
                aggregate_id: row.try_get("aggregate_id")?,
                event_type: row.try_get("type")?,
                routing_key: row.try_get("routing_key")?,
                correlation_id: row.try_get("correlation_id")?,
                payload: row.try_get("payload")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

/// Mark one row as published.
///
/// # Errors
///
/// Returns the underlying `sqlx` error.
pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE outbox SET sent_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Background relay publishing committed outbox rows to the bus.
///
/// Delivery is at-least-once: a crash between publish and `mark_sent`
/// republishes the row, which subscribers absorb through their idempotency
/// keys.
pub struct OutboxRelay {
    pool: PgPool,
    bus: Arc<dyn EventBus>,
    poll_interval: Duration,
    batch_size: i64,
    shutdown: broadcast::Receiver<()>,
}

impl OutboxRelay {
    /// Relay over a pool and bus.
    #[must_use]
    pub fn new(
        pool: PgPool,
        bus: Arc<dyn EventBus>,
        poll_interval: Duration,
        batch_size: i64,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            pool,
            bus,
            poll_interval,
            batch_size,
            shutdown,
        }
    }

    /// Spawn the relay loop as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("outbox relay started");
            loop {
                tokio::select! {
                    _ = self.shutdown.recv() => {
                        info!("outbox relay received shutdown signal");
                        break;
                    }
                    () = tokio::time::sleep(self.poll_interval) => {
                        if let Err(err) = self.drain_once().await {
                            error!(error = %err, "outbox drain failed");
                        }
                    }
                }
            }
            info!("outbox relay stopped");
        })
    }

    /// Publish one batch of unsent rows.
    ///
    /// # Errors
    ///
    /// Returns the first database error; publish failures of individual
    /// rows are logged and retried on the next poll.
    pub async fn drain_once(&self) -> Result<usize, sqlx::Error> {
        let rows = fetch_unsent(&self.pool, self.batch_size).await?;
        let mut published = 0;
        for row in rows {
            match self.bus.publish(&row.envelope()).await {
                Ok(()) => {
                    mark_sent(&self.pool, row.id).await?;
                    published += 1;
                    debug!(event_type = %row.event_type, id = %row.id, "outbox row published");
                }
                Err(err) => {
                    // Leave the row unsent; the next poll retries it.
                    error!(
                        event_type = %row.event_type,
                        id = %row.id,
                        error = %err,
                        "failed to publish outbox row"
                    );
                }
            }
        }
        Ok(published)
    }
}
