//! Event bus ingress: `user_created` starts wallet provisioning.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use emporium_core::bus::EventRouter;
use emporium_core::error::DomainError;
use emporium_workflow::WorkflowClient;

use crate::infrastructure::workflows::{UserCreatedMessage, CREATE_WALLET_WORKFLOW};
use crate::TASK_QUEUE;

/// Routing table for the payment consumer.
///
/// The workflow id is the delivery correlation id when present, otherwise
/// derived from the user id — either way a redelivery dedups against the
/// recorded run.
#[must_use]
pub fn event_router(workflow_client: Arc<WorkflowClient>) -> EventRouter {
    EventRouter::new("payment-service")
        .on("user_created", move |event: UserCreatedMessage, ctx| {
            let workflow_client = Arc::clone(&workflow_client);
            async move {
                let workflow_id = ctx
                    .correlation_id
                    .unwrap_or_else(|| format!("create-wallet-{}", event.user_id));
                workflow_client
                    .start_workflow(TASK_QUEUE, CREATE_WALLET_WORKFLOW, &workflow_id, &event)
                    .await
                    .map_err(DomainError::internal)?;
                Ok(())
            }
        })
        .on("user_updated", |payload: Value, _ctx| async move {
            info!(%payload, "received user_updated event");
            Ok(())
        })
}
