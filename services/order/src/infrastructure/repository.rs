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

use crate::domain::{Order, OrderItem, OrderRepository, OrderStatus, AGGREGATE_TYPE};
use crate::SOURCE_APP;

/// Repositories of the order context bound to one transaction.
pub struct PgOrderProvider {
    tx: PgTransaction,
}

impl TxProvider for PgOrderProvider {
    fn from_tx(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn into_tx(self) -> PgTransaction {
        self.tx
    }
}

#[derive(FromRow)]
struct OrderRow {
    order_id: Uuid,
    customer_id: Uuid,
    status: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    count: i32,
    total_price: Decimal,
}

#[async_trait]
impl OrderRepository for PgOrderProvider {
    async fn store(&mut self, order: &Order) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO orders
                (order_id, customer_id, status, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (order_id) DO UPDATE SET
                customer_id = EXCLUDED.customer_id,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(order.order_id)
        .bind(order.customer_id)
        .bind(order.status.code())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;

        // Reconcile children: the persisted set must equal the in-memory
        // item list, so drop and reinsert.
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DomainError::internal)?;
        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, count, total_price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.count)
            .bind(item.total_price)
            .execute(&mut *self.tx)
            .await
            .map_err(DomainError::internal)?;
        }
        Ok(())
    }

    async fn find(&mut self, order_id: Uuid) -> Result<Order, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT order_id, customer_id, status, created_at, updated_at, deleted_at
             FROM orders WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        let Some(row) = row else {
            return Err(DomainError::not_found(AGGREGATE_TYPE, order_id));
        };
        let status = OrderStatus::from_code(row.status)
            .ok_or_else(|| DomainError::Internal(format!("corrupt order status {}", row.status)))?;

        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, count, total_price
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;

        Ok(Order {
            order_id: row.order_id,
            customer_id: row.customer_id,
            status,
            items: item_rows
                .into_iter()
                .map(|item| OrderItem {
                    order_id: item.order_id,
                    product_id: item.product_id,
                    count: item.count,
                    total_price: item.total_price,
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[async_trait]
impl EventDispatcher for PgOrderProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        outbox::append(&mut self.tx, SOURCE_APP, &envelope).await
    }
}
