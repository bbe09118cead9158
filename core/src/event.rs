//! Domain events and the envelope they travel in.
//!
//! Events represent immutable facts about things that have happened. Every
//! mutating domain operation produces at most one event; the application
//! layer appends it to the outbox inside the same transaction as the state
//! change, and a relay publishes it to the broker after commit.
//!
//! Serialization is stable JSON: the envelope carries the `type` string
//! discriminator and an optional correlation id, the payload is the event's
//! own JSON object.
//!
//! # Example
//!
//! ```
//! use emporium_core::event::{DomainEvent, EventEnvelope};
//! use serde::Serialize;
//! use uuid::Uuid;
//!
//! #[derive(Serialize)]
//! struct OrderCreated {
//!     order_id: Uuid,
//!     customer_id: Uuid,
//! }
//!
//! impl DomainEvent for OrderCreated {
//!     fn event_type(&self) -> &'static str {
//!         "OrderCreated"
//!     }
//!     fn aggregate_id(&self) -> Uuid {
//!         self.order_id
//!     }
//! }
//!
//! let event = OrderCreated { order_id: Uuid::now_v7(), customer_id: Uuid::now_v7() };
//! let envelope = EventEnvelope::from_event("order", &event).unwrap();
//! assert_eq!(envelope.event_type, "OrderCreated");
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Content type of every event on the bus.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A domain fact produced by a mutating operation.
///
/// The `event_type()` string is the authoritative discriminator used for
/// routing at subscribers; it must match the published catalogue exactly
/// (`user_created`, `OrderStatusChanged`, …).
pub trait DomainEvent: Serialize {
    /// Stable event type discriminator.
    fn event_type(&self) -> &'static str;

    /// Identity of the aggregate the fact is about.
    fn aggregate_id(&self) -> Uuid;

    /// Routing key on the bus; defaults to the event type.
    fn routing_key(&self) -> String {
        self.event_type().to_string()
    }
}

/// The wire envelope around a serialized domain event.
///
/// This is what outbox rows and broker messages carry. Payload is the
/// event's JSON object; `event_type` is the discriminator subscribers route
/// on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique id of this envelope (outbox row key).
    pub id: Uuid,
    /// Event type discriminator, e.g. `"user_created"`.
    pub event_type: String,
    /// Aggregate kind the event belongs to, e.g. `"user"`.
    pub aggregate_type: String,
    /// Identity of the aggregate.
    pub aggregate_id: Uuid,
    /// Correlation id carried through to subscribers, if any.
    pub correlation_id: Option<String>,
    /// Broker routing key.
    pub routing_key: String,
    /// The event payload as stable JSON.
    pub payload: serde_json::Value,
    /// When the producing operation ran.
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wrap a domain event into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Internal`] if the event cannot be serialized,
    /// which only happens for payloads with non-string map keys.
    pub fn from_event<E: DomainEvent>(
        aggregate_type: &str,
        event: &E,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::now_v7(),
            event_type: event.event_type().to_string(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: event.aggregate_id(),
            correlation_id: None,
            routing_key: event.routing_key(),
            payload: serde_json::to_value(event)?,
            occurred_at: Utc::now(),
        })
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Transactional event sink handed to the application layer.
///
/// Implementations append the envelope to the service's outbox table within
/// the ambient transaction; nothing reaches the broker until that
/// transaction commits. The in-memory provider used in tests records the
/// envelope in the same snapshot-rolled-back state, preserving atomicity.
#[async_trait]
pub trait EventDispatcher: Send {
    /// Record the envelope for publication after commit.
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError>;
}

/// Dispatch a domain event through the provider's outbox.
///
/// Convenience used by application services: builds the envelope and hands
/// it to the dispatcher.
///
/// # Errors
///
/// Propagates serialization and dispatch failures.
pub async fn dispatch_event<D, E>(
    dispatcher: &mut D,
    aggregate_type: &str,
    event: &E,
) -> Result<(), DomainError>
where
    D: EventDispatcher + ?Sized,
    E: DomainEvent + Sync,
{
    let envelope = EventEnvelope::from_event(aggregate_type, event)?;
    dispatcher.dispatch(envelope).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Created {
        user_id: Uuid,
        login: String,
    }

    impl DomainEvent for Created {
        fn event_type(&self) -> &'static str {
            "user_created"
        }
        fn aggregate_id(&self) -> Uuid {
            self.user_id
        }
    }

    #[test]
    fn envelope_carries_type_and_payload() {
        let id = Uuid::now_v7();
        let event = Created {
            user_id: id,
            login: "bob".into(),
        };
        let envelope = EventEnvelope::from_event("user", &event).expect("serializable");

        assert_eq!(envelope.event_type, "user_created");
        assert_eq!(envelope.aggregate_type, "user");
        assert_eq!(envelope.aggregate_id, id);
        assert_eq!(envelope.routing_key, "user_created");
        assert_eq!(envelope.payload["login"], "bob");
        assert!(envelope.correlation_id.is_none());
    }

    #[test]
    fn correlation_id_round_trips_through_json() {
        let event = Created {
            user_id: Uuid::now_v7(),
            login: "eve".into(),
        };
        let envelope = EventEnvelope::from_event("user", &event)
            .expect("serializable")
            .with_correlation_id("corr-1");

        let json = serde_json::to_string(&envelope).expect("serializable");
        let back: EventEnvelope = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(back, envelope);
    }
}
