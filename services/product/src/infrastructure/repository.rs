//! Postgres-backed repository provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_postgres::outbox;
use emporium_postgres::unit_of_work::{PgTransaction, TxProvider};

use crate::domain::{Product, ProductRepository, AGGREGATE_TYPE};
use crate::SOURCE_APP;

/// Repositories of the product context bound to one transaction.
pub struct PgProductProvider {
    tx: PgTransaction,
}

impl TxProvider for PgProductProvider {
    fn from_tx(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn into_tx(self) -> PgTransaction {
        self.tx
    }
}

#[derive(FromRow)]
struct ProductRow {
    product_id: Uuid,
    name: String,
    price: Decimal,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl ProductRepository for PgProductProvider {
    async fn store(&mut self, product: &Product) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO products
                (product_id, name, price, quantity, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (product_id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(product.product_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find(&mut self, product_id: Uuid) -> Result<Product, DomainError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT product_id, name, price, quantity, created_at, updated_at, deleted_at
             FROM products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        row.map(Product::from)
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, product_id))
    }

    async fn reserve_stock(
        &mut self,
        product_id: Uuid,
        quantity: i32,
        reservation_key: &str,
    ) -> Result<bool, DomainError> {
        let recorded = sqlx::query(
            "INSERT INTO stock_reservations (reservation_key, product_id, quantity, created_at)
             VALUES ($1, $2, $3, now())
             ON CONFLICT (reservation_key) DO NOTHING",
        )
        .bind(reservation_key)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        if recorded.rows_affected() == 0 {
            return Ok(false);
        }

        // Conditional decrement; the transaction rollback also undoes the
        // reservation row when stock is short.
        let decremented = sqlx::query(
            "UPDATE products SET quantity = quantity - $2, updated_at = now()
             WHERE product_id = $1 AND quantity >= $2",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        if decremented.rows_affected() == 0 {
            return Err(DomainError::InsufficientStock { product_id });
        }
        Ok(true)
    }

    async fn release_stock(
        &mut self,
        product_id: Uuid,
        reservation_key: &str,
    ) -> Result<bool, DomainError> {
        let released: Option<(i32,)> = sqlx::query_as(
            "DELETE FROM stock_reservations
             WHERE reservation_key = $1 AND product_id = $2
             RETURNING quantity",
        )
        .bind(reservation_key)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        let Some((quantity,)) = released else {
            return Ok(false);
        };

        sqlx::query(
            "UPDATE products SET quantity = quantity + $2, updated_at = now()
             WHERE product_id = $1",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(true)
    }
}

#[async_trait]
impl EventDispatcher for PgProductProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        outbox::append(&mut self.tx, SOURCE_APP, &envelope).await
    }
}
