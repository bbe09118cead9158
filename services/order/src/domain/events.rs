//! Order facts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::DomainEvent;

use super::order::OrderStatus;

/// `OrderCreated` — an open order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// New order's id.
    pub order_id: Uuid,
    /// Customer who placed it.
    pub customer_id: Uuid,
}

impl DomainEvent for OrderCreated {
    fn event_type(&self) -> &'static str {
        "OrderCreated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// `OrderStatusChanged` — the state machine moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    /// Order id.
    pub order_id: Uuid,
    /// Previous status.
    pub from: OrderStatus,
    /// New status.
    pub to: OrderStatus,
}

impl DomainEvent for OrderStatusChanged {
    fn event_type(&self) -> &'static str {
        "OrderStatusChanged"
    }
    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// `OrderItemsChanged` — lines were added or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemsChanged {
    /// Order id.
    pub order_id: Uuid,
    /// Products added.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_items: Vec<Uuid>,
    /// Products removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_items: Vec<Uuid>,
}

impl DomainEvent for OrderItemsChanged {
    fn event_type(&self) -> &'static str {
        "OrderItemsChanged"
    }
    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// `OrderRemoved` — soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRemoved {
    /// Removed order's id.
    pub order_id: Uuid,
}

impl DomainEvent for OrderRemoved {
    fn event_type(&self) -> &'static str {
        "OrderRemoved"
    }
    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}
