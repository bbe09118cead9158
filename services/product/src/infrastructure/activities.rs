//! Workflow activities served on the product task queue.
//!
//! Registered by string name so the order saga can invoke them without
//! linking this crate.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_workflow::error::ActivityError;
use emporium_workflow::{TaskQueueTransport, Worker, WorkflowRunStore};

use crate::app::ProductAppService;
use crate::domain::ProductRepository;
use crate::TASK_QUEUE;

/// Input of the `ReserveProduct` activity.
#[derive(Debug, Deserialize)]
pub struct ReserveProductInput {
    /// Product to reserve from.
    pub product_id: Uuid,
    /// Units to reserve.
    pub quantity: i32,
    /// Saga-scoped idempotency key.
    pub reservation_key: String,
}

/// Input of the `ReleaseProduct` activity.
#[derive(Debug, Deserialize)]
pub struct ReleaseProductInput {
    /// Product the reservation belongs to.
    pub product_id: Uuid,
    /// Saga-scoped idempotency key.
    pub reservation_key: String,
}

/// Build the product worker with its activities registered.
#[must_use]
pub fn build_worker<U>(
    service: Arc<ProductAppService<U>>,
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
) -> Worker
where
    U: UnitOfWork + 'static,
    U::Provider: ProductRepository + EventDispatcher,
{
    let mut worker = Worker::new(TASK_QUEUE, transport, runs);

    let reserve_service = Arc::clone(&service);
    worker.register_activity("ReserveProduct", move |input: ReserveProductInput| {
        let service = Arc::clone(&reserve_service);
        async move {
            service
                .reserve(input.product_id, input.quantity, input.reservation_key)
                .await
                .map_err(ActivityError::from)
        }
    });

    let release_service = service;
    worker.register_activity("ReleaseProduct", move |input: ReleaseProductInput| {
        let service = Arc::clone(&release_service);
        async move {
            service
                .release(input.product_id, input.reservation_key)
                .await
                .map_err(ActivityError::from)
        }
    });

    worker
}
