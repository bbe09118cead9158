//! Payment application service.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::uow::UnitOfWork;

use crate::domain::{Payment, PaymentRepository, PaymentStatus, PAYMENT_AGGREGATE};

const BASE_LOCK: &str = "payment_";

fn payment_lock(payment_id: Uuid) -> String {
    format!("{BASE_LOCK}{payment_id}")
}

fn payment_order_lock(order_id: Uuid) -> String {
    format!("{BASE_LOCK}order_{order_id}")
}

/// Application service for the payment aggregate.
pub struct PaymentAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
}

impl<U> PaymentAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: PaymentRepository + EventDispatcher,
{
    /// Service over a unit of work.
    pub fn new(uow: U, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }

    /// Create a pending payment for an order.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative amount.
    pub async fn create_payment(
        &self,
        wallet_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<Uuid, DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![payment_order_lock(order_id)], move |provider| {
                Box::pin(async move {
                    let payment_id = provider.next_payment_id();
                    let (payment, event) =
                        Payment::create(payment_id, wallet_id, order_id, amount, now)?;
                    provider.store_payment(&payment).await?;
                    dispatch_event(provider, PAYMENT_AGGREGATE, &event).await?;
                    Ok(payment_id)
                })
            })
            .await
    }

    /// Drive the payment state machine.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown payments,
    /// [`DomainError::InvalidStateTransition`] for rejected moves.
    pub async fn set_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![payment_lock(payment_id)], move |provider| {
                Box::pin(async move {
                    let mut payment = provider.find_payment(payment_id).await?;
                    let Some(event) = payment.set_status(status, now)? else {
                        return Ok(());
                    };
                    provider.store_payment(&payment).await?;
                    dispatch_event(provider, PAYMENT_AGGREGATE, &event).await
                })
            })
            .await
    }

    /// Soft-delete a payment. Idempotent.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn remove_payment(&self, payment_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![payment_lock(payment_id)], move |provider| {
                Box::pin(async move {
                    let mut payment = match provider.find_payment(payment_id).await {
                        Ok(payment) => payment,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = payment.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store_payment(&payment).await?;
                    dispatch_event(provider, PAYMENT_AGGREGATE, &event).await
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_services;

    #[tokio::test]
    async fn status_walk_publishes_one_event_per_move() {
        let (payments, _, uow) = memory_services();
        let payment_id = payments
            .create_payment(Uuid::now_v7(), Uuid::now_v7(), Decimal::from(100))
            .await
            .expect("create");

        payments
            .set_payment_status(payment_id, PaymentStatus::Processing)
            .await
            .expect("processing");
        payments
            .set_payment_status(payment_id, PaymentStatus::Succeeded)
            .await
            .expect("succeeded");

        let types = uow
            .read(|p| p.outbox.iter().map(|e| e.event_type.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(
            types,
            vec![
                "PaymentCreated".to_string(),
                "PaymentStatusChanged".to_string(),
                "PaymentStatusChanged".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_transition_rolls_back_silently() {
        let (payments, _, uow) = memory_services();
        let payment_id = payments
            .create_payment(Uuid::now_v7(), Uuid::now_v7(), Decimal::from(100))
            .await
            .expect("create");

        let err = payments
            .set_payment_status(payment_id, PaymentStatus::Succeeded)
            .await
            .expect_err("must go via Processing");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let status = uow
            .read(|p| p.payments.values().next().map(|payment| payment.status))
            .await
            .expect("payment");
        assert_eq!(status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn remove_twice_publishes_once() {
        let (payments, _, uow) = memory_services();
        let payment_id = payments
            .create_payment(Uuid::now_v7(), Uuid::now_v7(), Decimal::from(100))
            .await
            .expect("create");

        payments.remove_payment(payment_id).await.expect("first");
        payments.remove_payment(payment_id).await.expect("second");

        let removed = uow
            .read(|p| {
                p.outbox
                    .iter()
                    .filter(|e| e.event_type == "PaymentRemoved")
                    .count()
            })
            .await;
        assert_eq!(removed, 1);
    }
}
