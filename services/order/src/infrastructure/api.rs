//! HTTP API for the order service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_web::{health_check, readiness_check, ApiError};

use crate::app::{NewOrder, NewOrderItem, OrderAppService};
use crate::domain::{OrderRepository, OrderStatus};

#[derive(Deserialize)]
pub struct StoreOrderItemRequest {
    pub product_id: Uuid,
    pub count: i32,
    pub total_price: Decimal,
}

#[derive(Deserialize)]
pub struct StoreOrderRequest {
    pub order_id: Option<Uuid>,
    pub customer_id: Uuid,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub items: Vec<StoreOrderItemRequest>,
}

#[derive(Serialize)]
pub struct StoreOrderResponse {
    pub order_id: Uuid,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub count: i32,
    pub total_price: Decimal,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub status: i32,
    pub items: Vec<OrderItemResponse>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

/// Build the order API router.
pub fn router<U>(service: Arc<OrderAppService<U>>) -> Router
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    Router::new()
        .route("/orders", post(store_order::<U>))
        .route(
            "/orders/:order_id",
            get(find_order::<U>).delete(remove_order::<U>),
        )
        .route(
            "/orders/:order_id/items/:product_id",
            delete(remove_item::<U>),
        )
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(service)
}

async fn store_order<U>(
    State(service): State<Arc<OrderAppService<U>>>,
    Json(request): Json<StoreOrderRequest>,
) -> Result<Json<StoreOrderResponse>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    let status = OrderStatus::from_code(request.status).ok_or_else(|| {
        ApiError(DomainError::InvalidArgument(format!(
            "unknown order status {}",
            request.status
        )))
    })?;
    let order_id = service
        .store_order(NewOrder {
            order_id: request.order_id,
            customer_id: request.customer_id,
            status,
            items: request
                .items
                .into_iter()
                .map(|item| NewOrderItem {
                    product_id: item.product_id,
                    count: item.count,
                    total_price: item.total_price,
                })
                .collect(),
        })
        .await?;
    Ok(Json(StoreOrderResponse { order_id }))
}

async fn find_order<U>(
    State(service): State<Arc<OrderAppService<U>>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    let order = service.find_order(order_id).await?;
    Ok(Json(OrderResponse {
        order_id: order.order_id,
        customer_id: order.customer_id,
        status: order.status.code(),
        items: order
            .items
            .into_iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                count: item.count,
                total_price: item.total_price,
            })
            .collect(),
        created_at: order.created_at.to_rfc3339(),
        updated_at: order.updated_at.to_rfc3339(),
        deleted_at: order.deleted_at.map(|t| t.to_rfc3339()),
    }))
}

async fn remove_order<U>(
    State(service): State<Arc<OrderAppService<U>>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<()>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    service.remove_order(order_id).await?;
    Ok(Json(()))
}

async fn remove_item<U>(
    State(service): State<Arc<OrderAppService<U>>>,
    Path((order_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<()>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    service.remove_item(order_id, product_id).await?;
    Ok(Json(()))
}
