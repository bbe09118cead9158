//! Event bus ingress: user lifecycle facts drive workflows, order status
//! changes are logged as a placeholder for outbound notification.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use emporium_core::bus::EventRouter;
use emporium_core::error::DomainError;
use emporium_workflow::WorkflowClient;

use crate::infrastructure::workflows::{
    UserCreatedMessage, UserUpdatedMessage, CREATE_USER_WORKFLOW, USER_UPDATED_WORKFLOW,
};
use crate::TASK_QUEUE;

/// `OrderStatusChanged` as this context reads it.
#[derive(Debug, Deserialize)]
struct OrderStatusChangedMessage {
    order_id: Uuid,
    from: i32,
    to: i32,
}

/// Routing table for the notification consumer.
#[must_use]
pub fn event_router(workflow_client: Arc<WorkflowClient>) -> EventRouter {
    let created_client = Arc::clone(&workflow_client);
    let updated_client = workflow_client;

    EventRouter::new("notification-service")
        .on("user_created", move |event: UserCreatedMessage, ctx| {
            let workflow_client = Arc::clone(&created_client);
            async move {
                let workflow_id = ctx
                    .correlation_id
                    .unwrap_or_else(|| format!("notification-user-created-{}", event.user_id));
                workflow_client
                    .start_workflow(TASK_QUEUE, CREATE_USER_WORKFLOW, &workflow_id, &event)
                    .await
                    .map_err(DomainError::internal)?;
                Ok(())
            }
        })
        .on("user_updated", move |event: UserUpdatedMessage, ctx| {
            let workflow_client = Arc::clone(&updated_client);
            async move {
                // Distinct updates need distinct workflow ids; redeliveries
                // of the same update must collapse into one run.
                let workflow_id = ctx.correlation_id.unwrap_or_else(|| {
                    format!("notification-user-updated-{}-{}", event.user_id, event.updated_at)
                });
                workflow_client
                    .start_workflow(TASK_QUEUE, USER_UPDATED_WORKFLOW, &workflow_id, &event)
                    .await
                    .map_err(DomainError::internal)?;
                Ok(())
            }
        })
        .on(
            "OrderStatusChanged",
            |event: OrderStatusChangedMessage, _ctx| async move {
                info!(
                    order_id = %event.order_id,
                    from = event.from,
                    to = event.to,
                    "order status changed"
                );
                Ok(())
            },
        )
}
