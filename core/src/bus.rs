//! Event bus abstraction: publishing and typed ingress routing.
//!
//! The bus carries one-way fact notifications between services. Delivery is
//! at-least-once: subscribers must be idempotent, keyed by aggregate id,
//! event type and correlation id.
//!
//! # Ingress dispatch policy
//!
//! Every consumer runs deliveries through an [`EventRouter`] with a static
//! routing table. The policy is shared by all services:
//!
//! - content type other than `application/json` → warn, **ack** (dropped,
//!   not requeued);
//! - event type not in the table → info, **ack** — foreign events must not
//!   become poison messages;
//! - payload of a known type that fails to deserialize → error, **ack**
//!   (malformed payloads are never transient);
//! - handler error → **requeue** for broker redelivery.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::DomainError;
use crate::event::{EventEnvelope, CONTENT_TYPE_JSON};

/// Errors raised by bus transports.
#[derive(Error, Debug)]
pub enum EventBusError {
    /// Could not reach the broker.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A publish was rejected or timed out.
    #[error("publish failed for routing key '{routing_key}': {reason}")]
    PublishFailed {
        /// Routing key of the failed publish.
        routing_key: String,
        /// Transport reason.
        reason: String,
    },

    /// A subscription could not be established.
    #[error("consume failed: {0}")]
    ConsumeFailed(String),

    /// Envelope could not be encoded for the wire.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Publish side of the bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one envelope with at-least-once semantics.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), EventBusError>;
}

/// One message as handed to a consumer by the broker.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Event type discriminator from the message properties.
    pub event_type: String,
    /// Broker routing key.
    pub routing_key: String,
    /// Correlation id, if the producer set one.
    pub correlation_id: Option<String>,
    /// MIME content type of the body.
    pub content_type: String,
    /// Raw payload bytes.
    pub body: Vec<u8>,
}

impl Delivery {
    /// Build the delivery a subscriber would receive for this envelope.
    ///
    /// Used by in-process transports and tests to short-circuit the broker.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Serialization`] if the payload cannot be
    /// encoded.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, EventBusError> {
        let body = serde_json::to_vec(&envelope.payload)
            .map_err(|e| EventBusError::Serialization(e.to_string()))?;
        Ok(Self {
            event_type: envelope.event_type.clone(),
            routing_key: envelope.routing_key.clone(),
            correlation_id: envelope.correlation_id.clone(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            body,
        })
    }
}

/// Delivery metadata passed to typed handlers alongside the decoded event.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    /// Correlation id of the delivery, if any.
    pub correlation_id: Option<String>,
    /// Routing key the delivery arrived on.
    pub routing_key: String,
}

/// What the consumer should tell the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge; the message is done (including dropped ones).
    Ack,
    /// Return to the broker for redelivery.
    Requeue,
}

type Handler = Arc<dyn Fn(Delivery) -> BoxFuture<'static, Result<(), DomainError>> + Send + Sync>;

/// Static routing table from event type to typed handler.
///
/// Built once at service start, then driven by the transport's consume
/// loop. See the module docs for the dispatch policy.
pub struct EventRouter {
    name: String,
    routes: HashMap<&'static str, Handler>,
}

impl EventRouter {
    /// Create a router named after the consuming service (for logging).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: HashMap::new(),
        }
    }

    /// Register a typed handler for an event type.
    ///
    /// The payload is deserialized into `E` before the handler runs. A
    /// deserialization failure drops the delivery (see policy).
    #[must_use]
    pub fn on<E, F, Fut>(mut self, event_type: &'static str, handler: F) -> Self
    where
        E: DeserializeOwned + Send + 'static,
        F: Fn(E, DeliveryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.routes.insert(
            event_type,
            Arc::new(move |delivery: Delivery| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let ctx = DeliveryContext {
                        correlation_id: delivery.correlation_id.clone(),
                        routing_key: delivery.routing_key.clone(),
                    };
                    let event: E = serde_json::from_slice(&delivery.body)
                        .map_err(|e| DomainError::InvalidArgument(e.to_string()))?;
                    handler(event, ctx).await
                })
            }),
        );
        self
    }

    /// Event types this router handles.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.routes.keys().copied().collect()
    }

    /// Run one delivery through the routing table.
    ///
    /// Never panics and never returns an error: every outcome is folded
    /// into a [`Disposition`] for the transport.
    pub async fn dispatch(&self, delivery: Delivery) -> Disposition {
        if delivery.content_type != CONTENT_TYPE_JSON {
            warn!(
                consumer = %self.name,
                routing_key = %delivery.routing_key,
                content_type = %delivery.content_type,
                "invalid content type, skipping delivery"
            );
            return Disposition::Ack;
        }

        let Some(handler) = self.routes.get(delivery.event_type.as_str()) else {
            info!(
                consumer = %self.name,
                event_type = %delivery.event_type,
                "unhandled delivery, skipping"
            );
            return Disposition::Ack;
        };

        let event_type = delivery.event_type.clone();
        let correlation_id = delivery.correlation_id.clone();
        match handler(delivery).await {
            Ok(()) => {
                info!(
                    consumer = %self.name,
                    event_type = %event_type,
                    correlation_id = ?correlation_id,
                    "successfully handled delivery"
                );
                Disposition::Ack
            }
            Err(DomainError::InvalidArgument(reason)) => {
                // Malformed payload of a known type: dropping beats poisoning.
                error!(
                    consumer = %self.name,
                    event_type = %event_type,
                    %reason,
                    "failed to decode delivery, dropping"
                );
                Disposition::Ack
            }
            Err(err) => {
                error!(
                    consumer = %self.name,
                    event_type = %event_type,
                    error = %err,
                    "failed to handle delivery, requeueing"
                );
                Disposition::Requeue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct Ping {
        value: u32,
    }

    fn delivery(event_type: &str, content_type: &str, body: &[u8]) -> Delivery {
        Delivery {
            event_type: event_type.to_string(),
            routing_key: event_type.to_string(),
            correlation_id: Some("corr-1".to_string()),
            content_type: content_type.to_string(),
            body: body.to_vec(),
        }
    }

    #[tokio::test]
    async fn routes_known_event_to_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        let router = EventRouter::new("test").on("ping", move |event: Ping, ctx| {
            let seen = Arc::clone(&seen_clone);
            async move {
                assert_eq!(event.value, 7);
                assert_eq!(ctx.correlation_id.as_deref(), Some("corr-1"));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let disposition = router
            .dispatch(delivery("ping", CONTENT_TYPE_JSON, br#"{"value":7}"#))
            .await;
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_event_is_acked_not_requeued() {
        let router = EventRouter::new("test")
            .on("ping", |_: Ping, _| async { Ok(()) });

        let disposition = router
            .dispatch(delivery("pong", CONTENT_TYPE_JSON, b"{}"))
            .await;
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn wrong_content_type_is_dropped() {
        let router = EventRouter::new("test")
            .on("ping", |_: Ping, _| async { Ok(()) });

        let disposition = router
            .dispatch(delivery("ping", "text/plain", br#"{"value":7}"#))
            .await;
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn handler_error_requeues() {
        let router = EventRouter::new("test").on("ping", |_: Ping, _| async {
            Err(DomainError::Internal("transient".into()))
        });

        let disposition = router
            .dispatch(delivery("ping", CONTENT_TYPE_JSON, br#"{"value":7}"#))
            .await;
        assert_eq!(disposition, Disposition::Requeue);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        let router = EventRouter::new("test")
            .on("ping", |_: Ping, _| async { Ok(()) });

        let disposition = router
            .dispatch(delivery("ping", CONTENT_TYPE_JSON, b"not json"))
            .await;
        assert_eq!(disposition, Disposition::Ack);
    }
}
