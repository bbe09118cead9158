//! Workflow activities served on the order task queue.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_workflow::error::ActivityError;
use emporium_workflow::{TaskQueueTransport, Worker, WorkflowRunStore};

use crate::app::OrderAppService;
use crate::domain::{OrderRepository, OrderStatus};
use crate::infrastructure::saga;
use crate::TASK_QUEUE;

/// Input of the `SetOrderStatusActivity`.
#[derive(Debug, Deserialize)]
pub struct SetOrderStatusInput {
    /// Order to move.
    pub order_id: Uuid,
    /// Target status by name, e.g. `"Cancelled"`.
    pub status: String,
}

/// Build the order worker with the saga and its coordinator activity.
#[must_use]
pub fn build_worker<U>(
    service: Arc<OrderAppService<U>>,
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
) -> Worker
where
    U: UnitOfWork + 'static,
    U::Provider: OrderRepository + EventDispatcher,
{
    let mut worker = Worker::new(TASK_QUEUE, transport, runs);

    worker.register_activity(
        "SetOrderStatusActivity",
        move |input: SetOrderStatusInput| {
            let service = Arc::clone(&service);
            async move {
                let status = OrderStatus::from_name(&input.status).ok_or_else(|| {
                    ActivityError::from(DomainError::InvalidArgument(format!(
                        "unknown order status {:?}",
                        input.status
                    )))
                })?;
                service
                    .set_order_status(input.order_id, status)
                    .await
                    .map_err(ActivityError::from)
            }
        },
    );

    saga::register(&mut worker);
    worker
}
