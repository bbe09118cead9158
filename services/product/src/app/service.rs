//! Product application service.
//!
//! Catalogue mutations publish facts through the outbox. Stock reservation
//! and release are silent conditional updates: the atomic decrement with a
//! stock precondition is the invariant, and the recorded reservation key
//! makes replays harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::uow::UnitOfWork;

use crate::domain::{Product, ProductRepository, AGGREGATE_TYPE};

/// Input of `CreateProduct`.
#[derive(Debug, Clone)]
pub struct NewProduct {
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Initial stock.
    pub quantity: i32,
}

/// Read model returned by `FindProduct`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductData {
    /// Product id.
    pub product_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Available stock.
    pub quantity: i32,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductData {
    fn from(product: Product) -> Self {
        Self {
            product_id: product.product_id,
            name: product.name,
            price: product.price,
            quantity: product.quantity,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Application service for the product aggregate.
pub struct ProductAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
}

impl<U> ProductAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: ProductRepository + EventDispatcher,
{
    /// Service over a unit of work.
    pub fn new(uow: U, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }

    /// Add a product to the catalogue.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for negative price or quantity.
    pub async fn create_product(&self, new_product: NewProduct) -> Result<Uuid, DomainError> {
        let now = self.clock.now();
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let product_id = provider.next_id();
                    let (product, event) = Product::create(
                        product_id,
                        new_product.name,
                        new_product.price,
                        new_product.quantity,
                        now,
                    )?;
                    provider.store(&product).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                    Ok(product_id)
                })
            })
            .await
    }

    /// Rename and reprice a product.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown products.
    pub async fn update_product(
        &self,
        product_id: Uuid,
        name: String,
        price: Decimal,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let mut product = provider.find(product_id).await?;
                    let event = product.update(name, price, now)?;
                    provider.store(&product).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Soft-delete a product. Idempotent.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn remove_product(&self, product_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let mut product = match provider.find(product_id).await {
                        Ok(product) => product,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = product.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store(&product).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Load a product.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown products.
    pub async fn find_product(&self, product_id: Uuid) -> Result<ProductData, DomainError> {
        self.uow
            .execute(move |provider| {
                Box::pin(async move { provider.find(product_id).await.map(ProductData::from) })
            })
            .await
    }

    /// Reserve stock under an idempotency key.
    ///
    /// # Errors
    ///
    /// [`DomainError::InsufficientStock`] when fewer units are available
    /// than requested; [`DomainError::InvalidArgument`] for a non-positive
    /// quantity.
    pub async fn reserve(
        &self,
        product_id: Uuid,
        quantity: i32,
        reservation_key: String,
    ) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidArgument(
                "reservation quantity must be positive".to_string(),
            ));
        }
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let fresh = provider
                        .reserve_stock(product_id, quantity, &reservation_key)
                        .await?;
                    if !fresh {
                        info!(%product_id, %reservation_key, "reservation replayed, stock untouched");
                    }
                    Ok(())
                })
            })
            .await
    }

    /// Release a reservation. Unknown keys are a no-op.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn release(
        &self,
        product_id: Uuid,
        reservation_key: String,
    ) -> Result<(), DomainError> {
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let released = provider.release_stock(product_id, &reservation_key).await?;
                    if !released {
                        info!(%product_id, %reservation_key, "release for unknown reservation, skipping");
                    }
                    Ok(())
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_service;

    fn widget(quantity: i32) -> NewProduct {
        NewProduct {
            name: "widget".into(),
            price: Decimal::from(10),
            quantity,
        }
    }

    #[tokio::test]
    async fn reserve_decrements_and_release_restores() {
        let (service, _uow) = memory_service();
        let id = service.create_product(widget(10)).await.expect("create");

        service
            .reserve(id, 3, "saga-1:widget".into())
            .await
            .expect("reserve");
        assert_eq!(service.find_product(id).await.expect("find").quantity, 7);

        service
            .release(id, "saga-1:widget".into())
            .await
            .expect("release");
        assert_eq!(service.find_product(id).await.expect("find").quantity, 10);
    }

    #[tokio::test]
    async fn reserve_beyond_stock_is_rejected_without_side_effects() {
        let (service, uow) = memory_service();
        let id = service.create_product(widget(2)).await.expect("create");

        let err = service
            .reserve(id, 3, "saga-1:widget".into())
            .await
            .expect_err("insufficient");
        assert!(matches!(err, DomainError::InsufficientStock { .. }));

        assert_eq!(service.find_product(id).await.expect("find").quantity, 2);
        assert_eq!(uow.read(|p| p.reservations.len()).await, 0);
    }

    #[tokio::test]
    async fn replayed_reservation_decrements_once() {
        let (service, _uow) = memory_service();
        let id = service.create_product(widget(10)).await.expect("create");

        for _ in 0..3 {
            service
                .reserve(id, 4, "saga-1:widget".into())
                .await
                .expect("reserve");
        }
        assert_eq!(service.find_product(id).await.expect("find").quantity, 6);
    }

    #[tokio::test]
    async fn release_of_unknown_key_is_a_noop() {
        let (service, _uow) = memory_service();
        let id = service.create_product(widget(5)).await.expect("create");

        service.release(id, "never-reserved".into()).await.expect("release");
        assert_eq!(service.find_product(id).await.expect("find").quantity, 5);
    }

    #[tokio::test]
    async fn interleaved_reserves_and_releases_balance_out() {
        let (service, _uow) = memory_service();
        let id = service.create_product(widget(10)).await.expect("create");

        service.reserve(id, 2, "r1".into()).await.expect("r1");
        service.reserve(id, 3, "r2".into()).await.expect("r2");
        service.release(id, "r1".into()).await.expect("release r1");
        service.reserve(id, 1, "r3".into()).await.expect("r3");
        service.release(id, "r2".into()).await.expect("release r2");
        service.release(id, "r3".into()).await.expect("release r3");

        assert_eq!(service.find_product(id).await.expect("find").quantity, 10);
    }

    #[tokio::test]
    async fn create_publishes_catalogue_fact() {
        let (service, uow) = memory_service();
        service.create_product(widget(1)).await.expect("create");
        let types = uow
            .read(|p| p.outbox.iter().map(|e| e.event_type.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(types, vec!["ProductCreated".to_string()]);
    }
}
