//! HTTP API for the product service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_web::{health_check, readiness_check, ApiError};

use crate::app::{NewProduct, ProductAppService, ProductData};
use crate::domain::ProductRepository;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct CreateProductResponse {
    pub product_id: Uuid,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}

/// Build the product API router.
pub fn router<U>(service: Arc<ProductAppService<U>>) -> Router
where
    U: UnitOfWork + 'static,
    U::Provider: ProductRepository + EventDispatcher,
{
    Router::new()
        .route("/ping", get(ping))
        .route("/products", post(create_product::<U>))
        .route("/products/:product_id", get(find_product::<U>))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(service)
}

async fn create_product<U>(
    State(service): State<Arc<ProductAppService<U>>>,
    Json(request): Json<CreateProductRequest>,
) -> Result<Json<CreateProductResponse>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: ProductRepository + EventDispatcher,
{
    let product_id = service
        .create_product(NewProduct {
            name: request.name,
            price: request.price,
            quantity: request.quantity,
        })
        .await?;
    Ok(Json(CreateProductResponse { product_id }))
}

async fn find_product<U>(
    State(service): State<Arc<ProductAppService<U>>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductData>, ApiError>
where
    U: UnitOfWork + 'static,
    U::Provider: ProductRepository + EventDispatcher,
{
    Ok(Json(service.find_product(product_id).await?))
}
