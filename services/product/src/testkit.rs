//! In-memory provider for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_testing::{test_clock, InMemoryUnitOfWork};

use crate::app::ProductAppService;
use crate::domain::{Product, ProductRepository, AGGREGATE_TYPE};

/// Recorded reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Product the units were taken from.
    pub product_id: Uuid,
    /// Units reserved.
    pub quantity: i32,
}

/// In-memory product repository plus recorded outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryProductProvider {
    /// Stored products by id.
    pub products: HashMap<Uuid, Product>,
    /// Active reservations by key.
    pub reservations: HashMap<String, Reservation>,
    /// Envelopes dispatched by committed bodies.
    pub outbox: Vec<EventEnvelope>,
}

#[async_trait]
impl ProductRepository for MemoryProductProvider {
    async fn store(&mut self, product: &Product) -> Result<(), DomainError> {
        self.products.insert(product.product_id, product.clone());
        Ok(())
    }

    async fn find(&mut self, product_id: Uuid) -> Result<Product, DomainError> {
        self.products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, product_id))
    }

    async fn reserve_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        reservation_key: &str,
    ) -> Result<bool, DomainError> {
        if self.reservations.contains_key(reservation_key) {
            return Ok(false);
        }
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, product_id))?;
        if product.quantity < quantity {
            return Err(DomainError::InsufficientStock { product_id });
        }
        product.quantity -= quantity;
        self.reservations.insert(
            reservation_key.to_string(),
            Reservation {
                product_id,
                quantity,
            },
        );
        Ok(true)
    }

    async fn release_stock(
        &mut self,
        product_id: Uuid,
        reservation_key: &str,
    ) -> Result<bool, DomainError> {
        let Some(reservation) = self.reservations.remove(reservation_key) else {
            return Ok(false);
        };
        if let Some(product) = self.products.get_mut(&product_id) {
            product.quantity += reservation.quantity;
        }
        Ok(true)
    }
}

#[async_trait]
impl EventDispatcher for MemoryProductProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.outbox.push(envelope);
        Ok(())
    }
}

/// Unit of work over the in-memory provider.
pub type MemoryProductUow = InMemoryUnitOfWork<MemoryProductProvider>;

/// App service over fresh in-memory state, plus a handle for assertions.
#[must_use]
pub fn memory_service() -> (ProductAppService<MemoryProductUow>, MemoryProductUow) {
    let uow = MemoryProductUow::default();
    let service = ProductAppService::new(uow.clone(), Arc::new(test_clock()));
    (service, uow)
}
