//! In-memory provider for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_testing::{test_clock, InMemoryUnitOfWork};

use crate::app::{PaymentAppService, WalletAppService};
use crate::domain::{
    Payment, PaymentRepository, Wallet, WalletRepository, PAYMENT_AGGREGATE, WALLET_AGGREGATE,
};

/// Seed balance used by the in-memory wallet service.
pub const TEST_DEFAULT_BALANCE: i64 = 1000;

/// In-memory payment-context repositories plus recorded outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryPaymentProvider {
    /// Stored payments by id.
    pub payments: HashMap<Uuid, Payment>,
    /// Stored wallets by id.
    pub wallets: HashMap<Uuid, Wallet>,
    /// Envelopes dispatched by committed bodies.
    pub outbox: Vec<EventEnvelope>,
}

#[async_trait]
impl PaymentRepository for MemoryPaymentProvider {
    async fn store_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        self.payments.insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Payment, DomainError> {
        self.payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(PAYMENT_AGGREGATE, payment_id))
    }
}

#[async_trait]
impl WalletRepository for MemoryPaymentProvider {
    async fn store_wallet(&mut self, wallet: &Wallet) -> Result<(), DomainError> {
        self.wallets.insert(wallet.wallet_id, wallet.clone());
        Ok(())
    }

    async fn find_wallet(&mut self, wallet_id: Uuid) -> Result<Wallet, DomainError> {
        self.wallets
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(WALLET_AGGREGATE, wallet_id))
    }

    async fn find_wallet_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, DomainError> {
        Ok(self
            .wallets
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl EventDispatcher for MemoryPaymentProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.outbox.push(envelope);
        Ok(())
    }
}

/// Unit of work over the in-memory provider.
pub type MemoryPaymentUow = InMemoryUnitOfWork<MemoryPaymentProvider>;

/// Payment and wallet services over shared in-memory state.
#[must_use]
pub fn memory_services() -> (
    PaymentAppService<MemoryPaymentUow>,
    WalletAppService<MemoryPaymentUow>,
    MemoryPaymentUow,
) {
    let uow = MemoryPaymentUow::default();
    let payments = PaymentAppService::new(uow.clone(), Arc::new(test_clock()));
    let wallets = WalletAppService::new(
        uow.clone(),
        Arc::new(test_clock()),
        Decimal::from(TEST_DEFAULT_BALANCE),
    );
    (payments, wallets, uow)
}
