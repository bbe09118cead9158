//! Workflows owned by the payment service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_workflow::{Worker, WorkflowContext, WorkflowError};

use crate::TASK_QUEUE;

/// The slice of `user_created` the wallet workflow needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedMessage {
    /// The new user.
    pub user_id: Uuid,
}

/// Workflow name for wallet provisioning.
pub const CREATE_WALLET_WORKFLOW: &str = "CreateWalletWorkflow";

/// `CreateWalletWorkflow`: a single `CreateWallet` activity.
///
/// Idempotent end to end — the workflow id dedups starts and the activity
/// short-circuits on an existing wallet.
async fn create_wallet_workflow(
    ctx: WorkflowContext,
    event: UserCreatedMessage,
) -> Result<(), WorkflowError> {
    let _wallet_id: Uuid = ctx
        .execute(
            "CreateWallet",
            &serde_json::json!({ "user_id": event.user_id }),
        )
        .await?;
    Ok(())
}

/// Register this service's workflows on its worker.
pub fn register(worker: &mut Worker) {
    debug_assert_eq!(worker.queue(), TASK_QUEUE);
    worker.register_workflow(CREATE_WALLET_WORKFLOW, create_wallet_workflow);
}
