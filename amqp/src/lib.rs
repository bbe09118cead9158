//! AMQP transport for the emporium services.
//!
//! Carries the two kinds of traffic the suite needs over a broker:
//!
//! - **Domain events** ([`AmqpEventBus`] / [`AmqpIngress`]): the outbox
//!   relay publishes envelopes to a topic exchange; each service consumes
//!   its own queue and runs deliveries through the shared
//!   [`EventRouter`] dispatch policy.
//! - **Task queues** ([`tasks::AmqpTaskTransport`] / [`tasks::AmqpTaskServer`]):
//!   activity calls as RPC over an exclusive reply queue, workflow
//!   submissions as fire-and-forget messages.

#![forbid(unsafe_code)]

pub mod tasks;

pub use tasks::{AmqpTaskServer, AmqpTaskTransport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use emporium_core::bus::{Delivery, Disposition, EventBus, EventBusError, EventRouter};
use emporium_core::config::AmqpConfig;
use emporium_core::event::{EventEnvelope, CONTENT_TYPE_JSON};

/// Open a broker connection.
///
/// # Errors
///
/// Returns the underlying `lapin` error when the broker is unreachable.
pub async fn connect(config: &AmqpConfig) -> Result<Connection, lapin::Error> {
    Connection::connect(&config.url, ConnectionProperties::default()).await
}

fn short(value: &str) -> ShortString {
    ShortString::from(value.to_string())
}

/// Publisher side of the domain-event bus.
///
/// Events go to one topic exchange, routed by the envelope's routing key.
pub struct AmqpEventBus {
    channel: Channel,
    exchange: String,
}

impl AmqpEventBus {
    /// Declare the exchange and build a publisher over it.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] when the channel or the
    /// exchange declaration fails.
    pub async fn new(connection: &Connection, exchange: &str) -> Result<Self, EventBusError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| EventBusError::ConnectionFailed(e.to_string()))?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| EventBusError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl EventBus for AmqpEventBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventBusError> {
        let body = serde_json::to_vec(&envelope.payload)
            .map_err(|e| EventBusError::Serialization(e.to_string()))?;

        let mut properties = BasicProperties::default()
            .with_kind(short(&envelope.event_type))
            .with_content_type(short(CONTENT_TYPE_JSON))
            .with_message_id(short(&envelope.id.to_string()));
        if let Some(correlation_id) = &envelope.correlation_id {
            properties = properties.with_correlation_id(short(correlation_id));
        }

        self.channel
            .basic_publish(
                &self.exchange,
                &envelope.routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| EventBusError::PublishFailed {
                routing_key: envelope.routing_key.clone(),
                reason: e.to_string(),
            })?
            .await
            .map_err(|e| EventBusError::PublishFailed {
                routing_key: envelope.routing_key.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Consumer side of the domain-event bus for one service.
///
/// Runs a subscribe-process-reconnect loop: declare the queue, bind it for
/// every routed event type, consume, and on connection trouble retry after
/// a delay. Dispositions from the router become ack/nack on the broker.
pub struct AmqpIngress {
    connection: Arc<Connection>,
    config: AmqpConfig,
    router: Arc<EventRouter>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl AmqpIngress {
    /// Ingress consumer for the configured queue.
    #[must_use]
    pub fn new(
        connection: Arc<Connection>,
        config: AmqpConfig,
        router: Arc<EventRouter>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            connection,
            config,
            router,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Spawn the consume loop as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(queue = %self.config.queue, "event ingress started");
            loop {
                tokio::select! {
                    _ = self.shutdown.recv() => {
                        info!(queue = %self.config.queue, "event ingress received shutdown signal");
                        break;
                    }
                    result = consume_until_error(&self.connection, &self.config, &self.router) => {
                        if let Err(err) = result {
                            error!(
                                queue = %self.config.queue,
                                error = %err,
                                "event ingress failed, retrying in {:?}",
                                self.retry_delay
                            );
                        } else {
                            warn!(queue = %self.config.queue, "event stream ended, reconnecting");
                        }
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
            info!(queue = %self.config.queue, "event ingress stopped");
        })
    }
}

async fn consume_until_error(
    connection: &Connection,
    config: &AmqpConfig,
    router: &EventRouter,
) -> Result<(), lapin::Error> {
    let channel = connection.create_channel().await?;
    channel
        .basic_qos(config.prefetch, BasicQosOptions::default())
        .await?;
    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    for event_type in router.event_types() {
        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                event_type,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    let mut consumer = channel
        .basic_consume(
            &config.queue,
            "emporium-ingress",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = %config.queue, "subscribed to event bus");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let incoming = Delivery {
            event_type: delivery
                .properties
                .kind()
                .clone()
                .map(|s| s.to_string())
                .unwrap_or_default(),
            routing_key: delivery.routing_key.to_string(),
            correlation_id: delivery
                .properties
                .correlation_id()
                .clone()
                .map(|s| s.to_string()),
            content_type: delivery
                .properties
                .content_type()
                .clone()
                .map(|s| s.to_string())
                .unwrap_or_default(),
            body: delivery.data.clone(),
        };

        match router.dispatch(incoming).await {
            Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
            Disposition::Requeue => {
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    })
                    .await?;
            }
        }
    }
    Ok(())
}
