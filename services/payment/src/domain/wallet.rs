//! The wallet aggregate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use emporium_core::error::DomainError;

use super::events::{WalletBalanceChanged, WalletCreated, WalletRemoved};

/// Aggregate kind for envelopes and error messages.
pub const WALLET_AGGREGATE: &str = "wallet";

/// The wallet aggregate root. One wallet per user.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    /// Unique identity.
    pub wallet_id: Uuid,
    /// Owning user (1:1).
    pub user_id: Uuid,
    /// Never-negative balance.
    pub balance: Decimal,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Wallet {
    /// Create a wallet with its seed balance.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative seed balance.
    pub fn create(
        wallet_id: Uuid,
        user_id: Uuid,
        balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Self, WalletCreated), DomainError> {
        if balance < Decimal::ZERO {
            return Err(DomainError::InvalidArgument(
                "wallet balance must not be negative".to_string(),
            ));
        }
        let wallet = Self {
            wallet_id,
            user_id,
            balance,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let event = WalletCreated {
            wallet_id,
            user_id,
            balance,
        };
        Ok((wallet, event))
    }

    /// Replace the balance.
    ///
    /// Setting the same balance is a no-op publishing nothing.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for a negative target balance.
    pub fn update_balance(
        &mut self,
        new_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Option<WalletBalanceChanged>, DomainError> {
        if new_balance < Decimal::ZERO {
            return Err(DomainError::InvalidArgument(
                "wallet balance must not be negative".to_string(),
            ));
        }
        if new_balance == self.balance {
            return Ok(None);
        }
        let old_balance = self.balance;
        self.balance = new_balance;
        self.updated_at = now;
        Ok(Some(WalletBalanceChanged {
            wallet_id: self.wallet_id,
            old_balance,
            new_balance,
        }))
    }

    /// Soft-delete the wallet. Idempotent.
    #[must_use]
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Option<WalletRemoved> {
        if self.deleted_at.is_some() {
            return None;
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Some(WalletRemoved {
            wallet_id: self.wallet_id,
        })
    }
}

/// Repository contract for wallets.
///
/// `find_by_user_id` is the lookup path the charge activity needs: the
/// saga addresses wallets by user, the store is keyed by wallet id.
#[async_trait]
pub trait WalletRepository: Send {
    /// Time-ordered identity for a new wallet.
    fn next_wallet_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }

    /// Upsert the aggregate.
    async fn store_wallet(&mut self, wallet: &Wallet) -> Result<(), DomainError>;

    /// Load by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such wallet exists.
    async fn find_wallet(&mut self, wallet_id: Uuid) -> Result<Wallet, DomainError>;

    /// Lookup by owning user.
    async fn find_wallet_by_user_id(&mut self, user_id: Uuid)
        -> Result<Option<Wallet>, DomainError>;
}
