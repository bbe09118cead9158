//! Notification facts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::DomainEvent;

use super::notification::NotificationStatus;

/// `NotificationCreated` — a notification is pending delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCreated {
    /// New notification's id.
    pub notification_id: Uuid,
    /// Destination address.
    pub email: String,
    /// Message body.
    pub message: String,
}

impl DomainEvent for NotificationCreated {
    fn event_type(&self) -> &'static str {
        "NotificationCreated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.notification_id
    }
}

/// `NotificationStatusChanged` — delivery was attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationStatusChanged {
    /// Notification id.
    pub notification_id: Uuid,
    /// Delivery outcome.
    pub status: NotificationStatus,
}

impl DomainEvent for NotificationStatusChanged {
    fn event_type(&self) -> &'static str {
        "NotificationStatusChanged"
    }
    fn aggregate_id(&self) -> Uuid {
        self.notification_id
    }
}

/// `NotificationRemoved` — soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRemoved {
    /// Removed notification's id.
    pub notification_id: Uuid,
}

impl DomainEvent for NotificationRemoved {
    fn event_type(&self) -> &'static str {
        "NotificationRemoved"
    }
    fn aggregate_id(&self) -> Uuid {
        self.notification_id
    }
}
