//! The product aggregate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::error::DomainError;

use super::events::{ProductCreated, ProductRemoved, ProductUpdated};

/// Aggregate kind for envelopes and error messages.
pub const AGGREGATE_TYPE: &str = "product";

/// The product aggregate root.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Unique identity.
    pub product_id: Uuid,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Available stock; reservations decrement, releases restore.
    pub quantity: i32,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Create a product, returning the aggregate and its creation fact.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative price or quantity.
    pub fn create(
        product_id: Uuid,
        name: String,
        price: Decimal,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<(Self, ProductCreated), DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::InvalidArgument(
                "price must not be negative".to_string(),
            ));
        }
        if quantity < 0 {
            return Err(DomainError::InvalidArgument(
                "quantity must not be negative".to_string(),
            ));
        }
        let product = Self {
            product_id,
            name,
            price,
            quantity,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let event = ProductCreated {
            product_id,
            name: product.name.clone(),
            price: product.price,
            quantity,
        };
        Ok((product, event))
    }

    /// Rename and reprice the product.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative price.
    pub fn update(
        &mut self,
        name: String,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ProductUpdated, DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::InvalidArgument(
                "price must not be negative".to_string(),
            ));
        }
        self.name = name;
        self.price = price;
        self.updated_at = now;
        Ok(ProductUpdated {
            product_id: self.product_id,
        })
    }

    /// Soft-delete the product. Idempotent.
    #[must_use]
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Option<ProductRemoved> {
        if self.deleted_at.is_some() {
            return None;
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Some(ProductRemoved {
            product_id: self.product_id,
        })
    }
}

/// Repository contract for products and their stock.
///
/// Reservations are conditional decrements recorded under a caller-supplied
/// key: a replayed reservation with a recorded key succeeds without
/// decrementing again, and a release restores stock and forgets the key.
#[async_trait]
pub trait ProductRepository: Send {
    /// Time-ordered identity for a new product.
    fn next_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }

    /// Upsert the aggregate.
    async fn store(&mut self, product: &Product) -> Result<(), DomainError>;

    /// Load by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such product exists.
    async fn find(&mut self, product_id: Uuid) -> Result<Product, DomainError>;

    /// Reserve `quantity` units under `reservation_key`.
    ///
    /// Returns `false` when the key is already recorded (idempotent
    /// replay, stock untouched).
    ///
    /// # Errors
    ///
    /// [`DomainError::InsufficientStock`] when fewer than `quantity` units
    /// are available; no row is modified in that case.
    async fn reserve_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        reservation_key: &str,
    ) -> Result<bool, DomainError>;

    /// Release the reservation recorded under `reservation_key`.
    ///
    /// Returns `false` for an unknown key (nothing to release).
    async fn release_stock(
        &mut self,
        product_id: Uuid,
        reservation_key: &str,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid")
    }

    #[test]
    fn create_rejects_negative_stock() {
        let err = Product::create(Uuid::now_v7(), "widget".into(), Decimal::from(10), -1, now())
            .expect_err("negative quantity");
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn create_rejects_negative_price() {
        let err = Product::create(Uuid::now_v7(), "widget".into(), Decimal::from(-1), 1, now())
            .expect_err("negative price");
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let (mut product, _) =
            Product::create(Uuid::now_v7(), "widget".into(), Decimal::from(10), 5, now())
                .expect("create");
        assert!(product.mark_deleted(now()).is_some());
        assert!(product.mark_deleted(now()).is_none());
    }
}
