//! Workflow activities served on the payment task queue.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use emporium_core::event::EventDispatcher;
use emporium_core::uow::UnitOfWork;
use emporium_workflow::error::ActivityError;
use emporium_workflow::{TaskQueueTransport, Worker, WorkflowRunStore};

use crate::app::{PaymentAppService, WalletAppService};
use crate::domain::{PaymentRepository, PaymentStatus, WalletRepository};
use crate::infrastructure::workflows;
use crate::TASK_QUEUE;

/// Input of the `CreateWallet` activity.
#[derive(Debug, Deserialize)]
pub struct CreateWalletInput {
    /// User the wallet belongs to.
    pub user_id: Uuid,
}

/// Input of the `ChargeWallet` and `RefundWallet` activities.
#[derive(Debug, Deserialize)]
pub struct WalletAmountInput {
    /// User whose wallet is adjusted.
    pub user_id: Uuid,
    /// Non-negative amount.
    pub amount: Decimal,
}

/// Input of the `CreatePayment` activity.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentInput {
    /// Wallet being charged.
    pub wallet_id: Uuid,
    /// Order being paid for.
    pub order_id: Uuid,
    /// Amount.
    pub amount: Decimal,
}

/// Input of the `SetPaymentStatus` activity.
#[derive(Debug, Deserialize)]
pub struct SetPaymentStatusInput {
    /// Payment to move.
    pub payment_id: Uuid,
    /// Target status code.
    pub status: i32,
}

/// Build the payment worker with its activities and workflows registered.
#[must_use]
pub fn build_worker<U>(
    payments: Arc<PaymentAppService<U>>,
    wallets: Arc<WalletAppService<U>>,
    transport: Arc<dyn TaskQueueTransport>,
    runs: Arc<dyn WorkflowRunStore>,
) -> Worker
where
    U: UnitOfWork + 'static,
    U::Provider: PaymentRepository + WalletRepository + EventDispatcher,
{
    let mut worker = Worker::new(TASK_QUEUE, transport, runs);

    let create_wallets = Arc::clone(&wallets);
    worker.register_activity("CreateWallet", move |input: CreateWalletInput| {
        let wallets = Arc::clone(&create_wallets);
        async move {
            wallets
                .create_wallet(input.user_id)
                .await
                .map_err(ActivityError::from)
        }
    });

    let charge_wallets = Arc::clone(&wallets);
    worker.register_activity("ChargeWallet", move |input: WalletAmountInput| {
        let wallets = Arc::clone(&charge_wallets);
        async move {
            wallets
                .adjust_wallet_balance(input.user_id, -input.amount)
                .await
                .map_err(ActivityError::from)
        }
    });

    let refund_wallets = wallets;
    worker.register_activity("RefundWallet", move |input: WalletAmountInput| {
        let wallets = Arc::clone(&refund_wallets);
        async move {
            wallets
                .adjust_wallet_balance(input.user_id, input.amount)
                .await
                .map_err(ActivityError::from)
        }
    });

    let create_payments = Arc::clone(&payments);
    worker.register_activity("CreatePayment", move |input: CreatePaymentInput| {
        let payments = Arc::clone(&create_payments);
        async move {
            payments
                .create_payment(input.wallet_id, input.order_id, input.amount)
                .await
                .map_err(ActivityError::from)
        }
    });

    let status_payments = payments;
    worker.register_activity("SetPaymentStatus", move |input: SetPaymentStatusInput| {
        let payments = Arc::clone(&status_payments);
        async move {
            let status = PaymentStatus::from_code(input.status).ok_or_else(|| {
                ActivityError::Application(format!("unknown payment status {}", input.status))
            })?;
            payments
                .set_payment_status(input.payment_id, status)
                .await
                .map_err(ActivityError::from)
        }
    });

    workflows::register(&mut worker);
    worker
}
