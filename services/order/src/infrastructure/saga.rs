//! The cross-service order saga.
//!
//! Forward steps: move the order to `Pending`, reserve every product on
//! the product queue, charge the customer's wallet on the payment queue,
//! settle as `Paid`. Compensation is explicit: on any failure the saga
//! releases the reservations it made so far (best effort — release errors
//! are logged, never abort compensation) and cancels the order.
//!
//! Every activity is idempotent, so a crashed run restarting from the
//! beginning is safe: `SetOrderStatusActivity` treats `from == to` as a
//! no-op and reservations carry a `<workflow_id>:<product_id>` key the
//! product service dedups on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use emporium_workflow::{Worker, WorkflowContext, WorkflowError};

use crate::{PAYMENT_TASK_QUEUE, PRODUCT_TASK_QUEUE};

/// Workflow name of the saga.
pub const CREATE_ORDER_SAGA: &str = "CreateOrderSaga";

/// One product line of the saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSagaItem {
    /// Product to reserve.
    pub product_id: Uuid,
    /// Units to reserve.
    pub quantity: i32,
}

/// Saga input, captured when the order is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSagaParams {
    /// Order being settled.
    pub order_id: Uuid,
    /// Customer whose wallet pays.
    pub user_id: Uuid,
    /// Products to reserve.
    pub items: Vec<OrderSagaItem>,
    /// Amount to charge.
    pub total_price: Decimal,
}

fn reservation_key(workflow_id: &str, product_id: Uuid) -> String {
    format!("{workflow_id}:{product_id}")
}

async fn set_order_status(
    ctx: &WorkflowContext,
    order_id: Uuid,
    status: &str,
) -> Result<(), WorkflowError> {
    ctx.execute::<_, ()>(
        "SetOrderStatusActivity",
        &json!({ "order_id": order_id, "status": status }),
    )
    .await
}

async fn release_reserved(ctx: &WorkflowContext, reserved: &[OrderSagaItem]) {
    for item in reserved {
        let input = json!({
            "product_id": item.product_id,
            "reservation_key": reservation_key(&ctx.workflow_id, item.product_id),
        });
        if let Err(err) = ctx
            .execute_activity::<_, ()>(PRODUCT_TASK_QUEUE, "ReleaseProduct", &input)
            .await
        {
            // Best-effort compensation: log and keep releasing the rest.
            error!(
                workflow_id = %ctx.workflow_id,
                product_id = %item.product_id,
                error = %err,
                "failed to release product"
            );
        }
    }
}

/// The saga body. Success leaves the order `Paid`; any unrecoverable
/// failure leaves it `Cancelled`, never permanently `Pending`.
async fn create_order_saga(
    ctx: WorkflowContext,
    params: OrderSagaParams,
) -> Result<(), WorkflowError> {
    info!(order_id = %params.order_id, workflow_id = %ctx.workflow_id, "starting order saga");

    set_order_status(&ctx, params.order_id, "Pending").await?;

    let mut reserved: Vec<OrderSagaItem> = Vec::new();
    for item in &params.items {
        let input = json!({
            "product_id": item.product_id,
            "quantity": item.quantity,
            "reservation_key": reservation_key(&ctx.workflow_id, item.product_id),
        });
        if let Err(err) = ctx
            .execute_activity::<_, ()>(PRODUCT_TASK_QUEUE, "ReserveProduct", &input)
            .await
        {
            error!(
                order_id = %params.order_id,
                product_id = %item.product_id,
                error = %err,
                "failed to reserve product"
            );
            release_reserved(&ctx, &reserved).await;
            return set_order_status(&ctx, params.order_id, "Cancelled").await;
        }
        reserved.push(item.clone());
    }

    let charge = json!({ "user_id": params.user_id, "amount": params.total_price });
    if let Err(err) = ctx
        .execute_activity::<_, ()>(PAYMENT_TASK_QUEUE, "ChargeWallet", &charge)
        .await
    {
        error!(
            order_id = %params.order_id,
            user_id = %params.user_id,
            error = %err,
            "failed to charge wallet"
        );
        release_reserved(&ctx, &reserved).await;
        return set_order_status(&ctx, params.order_id, "Cancelled").await;
    }

    set_order_status(&ctx, params.order_id, "Paid").await
}

/// Register the saga on the order worker.
pub fn register(worker: &mut Worker) {
    worker.register_workflow(CREATE_ORDER_SAGA, create_order_saga);
}
