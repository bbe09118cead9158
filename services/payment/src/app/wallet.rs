//! Wallet application service.
//!
//! `create_wallet` is idempotent per user: the `wallet_user_<uuid>` lock
//! serializes creation and an existing wallet short-circuits, so replayed
//! `user_created` deliveries never mint a second wallet. Charges and
//! refunds resolve the wallet by user id under the same lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::uow::UnitOfWork;

use crate::domain::{Wallet, WalletRepository, WALLET_AGGREGATE};

const BASE_LOCK: &str = "wallet_";

fn wallet_lock(wallet_id: Uuid) -> String {
    format!("{BASE_LOCK}{wallet_id}")
}

fn wallet_user_lock(user_id: Uuid) -> String {
    format!("{BASE_LOCK}user_{user_id}")
}

/// Read model returned by `FindWallet`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletData {
    /// Wallet id.
    pub wallet_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Current balance.
    pub balance: Decimal,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
}

impl From<Wallet> for WalletData {
    fn from(wallet: Wallet) -> Self {
        Self {
            wallet_id: wallet.wallet_id,
            user_id: wallet.user_id,
            balance: wallet.balance,
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

/// Application service for the wallet aggregate.
pub struct WalletAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
    default_balance: Decimal,
}

impl<U> WalletAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: WalletRepository + EventDispatcher,
{
    /// Service over a unit of work with the configured seed balance.
    pub fn new(uow: U, clock: Arc<dyn Clock>, default_balance: Decimal) -> Self {
        Self {
            uow,
            clock,
            default_balance,
        }
    }

    /// Create the user's wallet, or return the existing one.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn create_wallet(&self, user_id: Uuid) -> Result<Uuid, DomainError> {
        let now = self.clock.now();
        let default_balance = self.default_balance;
        self.uow
            .execute_locked(vec![wallet_user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    if let Some(existing) = provider.find_wallet_by_user_id(user_id).await? {
                        return Ok(existing.wallet_id);
                    }
                    let wallet_id = provider.next_wallet_id();
                    let (wallet, event) =
                        Wallet::create(wallet_id, user_id, default_balance, now)?;
                    provider.store_wallet(&wallet).await?;
                    dispatch_event(provider, WALLET_AGGREGATE, &event).await?;
                    Ok(wallet_id)
                })
            })
            .await
    }

    /// Replace a wallet's balance.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown wallets,
    /// [`DomainError::InvalidArgument`] for a negative target.
    pub async fn update_wallet_balance(
        &self,
        wallet_id: Uuid,
        new_balance: Decimal,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![wallet_lock(wallet_id)], move |provider| {
                Box::pin(async move {
                    let mut wallet = provider.find_wallet(wallet_id).await?;
                    let Some(event) = wallet.update_balance(new_balance, now)? else {
                        return Ok(());
                    };
                    provider.store_wallet(&wallet).await?;
                    dispatch_event(provider, WALLET_AGGREGATE, &event).await
                })
            })
            .await
    }

    /// Adjust the balance of the user's wallet by a signed delta.
    ///
    /// This is the charge/refund path: a charge passes a negative delta,
    /// and a result below zero is rejected before anything is written.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when the user has no wallet,
    /// [`DomainError::InsufficientFunds`] when a charge would overdraw.
    pub async fn adjust_wallet_balance(
        &self,
        user_id: Uuid,
        delta: Decimal,
    ) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![wallet_user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    let mut wallet = provider
                        .find_wallet_by_user_id(user_id)
                        .await?
                        .ok_or_else(|| DomainError::not_found(WALLET_AGGREGATE, user_id))?;
                    let new_balance = wallet.balance + delta;
                    if new_balance < Decimal::ZERO {
                        return Err(DomainError::InsufficientFunds {
                            wallet_id: wallet.wallet_id,
                        });
                    }
                    let Some(event) = wallet.update_balance(new_balance, now)? else {
                        return Ok(());
                    };
                    provider.store_wallet(&wallet).await?;
                    dispatch_event(provider, WALLET_AGGREGATE, &event).await
                })
            })
            .await
    }

    /// Soft-delete a wallet. Idempotent.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn remove_wallet(&self, wallet_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![wallet_lock(wallet_id)], move |provider| {
                Box::pin(async move {
                    let mut wallet = match provider.find_wallet(wallet_id).await {
                        Ok(wallet) => wallet,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = wallet.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store_wallet(&wallet).await?;
                    dispatch_event(provider, WALLET_AGGREGATE, &event).await
                })
            })
            .await
    }

    /// Load a wallet by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown wallets.
    pub async fn find_wallet(&self, wallet_id: Uuid) -> Result<WalletData, DomainError> {
        self.uow
            .execute_locked(vec![wallet_lock(wallet_id)], move |provider| {
                Box::pin(async move { provider.find_wallet(wallet_id).await.map(WalletData::from) })
            })
            .await
    }

    /// Load a wallet by its owning user.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when the user has no wallet.
    pub async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<WalletData, DomainError> {
        self.uow
            .execute_locked(vec![wallet_user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    provider
                        .find_wallet_by_user_id(user_id)
                        .await?
                        .map(WalletData::from)
                        .ok_or_else(|| DomainError::not_found(WALLET_AGGREGATE, user_id))
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
    async fn wallet_is_created_once_per_user() {
        let (_, wallets, uow) = memory_services();
        let user_id = Uuid::now_v7();

        let first = wallets.create_wallet(user_id).await.expect("first");
        let second = wallets.create_wallet(user_id).await.expect("second");
        assert_eq!(first, second);

        let (count, created_events) = uow
            .read(|p| {
                (
                    p.wallets.len(),
                    p.outbox
                        .iter()
                        .filter(|e| e.event_type == "WalletCreated")
                        .count(),
                )
            })
            .await;
        assert_eq!(count, 1);
        assert_eq!(created_events, 1);
    }

    #[tokio::test]
    async fn charge_and_refund_round_trip() {
        let (_, wallets, _uow) = memory_services();
        let user_id = Uuid::now_v7();
        let wallet_id = wallets.create_wallet(user_id).await.expect("create");

        wallets
            .adjust_wallet_balance(user_id, Decimal::from(-300))
            .await
            .expect("charge");
        wallets
            .adjust_wallet_balance(user_id, Decimal::from(100))
            .await
            .expect("refund");

        let wallet = wallets.find_wallet(wallet_id).await.expect("find");
        assert_eq!(wallet.balance, Decimal::from(1000 - 300 + 100));
    }

    #[tokio::test]
    async fn overdraft_is_rejected_and_balance_untouched() {
        let (_, wallets, uow) = memory_services();
        let user_id = Uuid::now_v7();
        wallets.create_wallet(user_id).await.expect("create");

        let err = wallets
            .adjust_wallet_balance(user_id, Decimal::from(-1001))
            .await
            .expect_err("overdraft");
        assert!(matches!(err, DomainError::InsufficientFunds { .. }));

        let balance = uow
            .read(|p| p.wallets.values().next().map(|w| w.balance))
            .await
            .expect("wallet");
        assert_eq!(balance, Decimal::from(1000));
    }

    #[tokio::test]
    async fn charge_without_wallet_is_not_found() {
        let (_, wallets, _uow) = memory_services();
        let err = wallets
            .adjust_wallet_balance(Uuid::now_v7(), Decimal::from(-10))
            .await
            .expect_err("no wallet");
        assert!(err.is_not_found());
    }
}
