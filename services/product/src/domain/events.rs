//! Product facts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::DomainEvent;

/// `ProductCreated` — a product entered the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCreated {
    /// New product's id.
    pub product_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Initial stock.
    pub quantity: i32,
}

impl DomainEvent for ProductCreated {
    fn event_type(&self) -> &'static str {
        "ProductCreated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.product_id
    }
}

/// `ProductUpdated` — name or price changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdated {
    /// Updated product's id.
    pub product_id: Uuid,
}

impl DomainEvent for ProductUpdated {
    fn event_type(&self) -> &'static str {
        "ProductUpdated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.product_id
    }
}

/// `ProductRemoved` — the product left the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRemoved {
    /// Removed product's id.
    pub product_id: Uuid,
}

impl DomainEvent for ProductRemoved {
    fn event_type(&self) -> &'static str {
        "ProductRemoved"
    }
    fn aggregate_id(&self) -> Uuid {
        self.product_id
    }
}
