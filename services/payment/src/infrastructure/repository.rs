//! Postgres-backed repository provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_postgres::outbox;
use emporium_postgres::unit_of_work::{PgTransaction, TxProvider};

use crate::domain::{
    Payment, PaymentRepository, PaymentStatus, Wallet, WalletRepository, PAYMENT_AGGREGATE,
    WALLET_AGGREGATE,
};
use crate::SOURCE_APP;

/// Repositories of the payment context bound to one transaction.
pub struct PgPaymentProvider {
    tx: PgTransaction,
}

impl TxProvider for PgPaymentProvider {
    fn from_tx(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn into_tx(self) -> PgTransaction {
        self.tx
    }
}

#[derive(FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    wallet_id: Uuid,
    order_id: Uuid,
    amount: Decimal,
    status: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, DomainError> {
        let status = PaymentStatus::from_code(self.status).ok_or_else(|| {
            DomainError::Internal(format!("corrupt payment status {}", self.status))
        })?;
        Ok(Payment {
            payment_id: self.payment_id,
            wallet_id: self.wallet_id,
            order_id: self.order_id,
            amount: self.amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[derive(FromRow)]
struct WalletRow {
    wallet_id: Uuid,
    user_id: Uuid,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            wallet_id: row.wallet_id,
            user_id: row.user_id,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentProvider {
    async fn store_payment(&mut self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO payments
                (payment_id, wallet_id, order_id, amount, status,
                 created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (payment_id) DO UPDATE SET
                wallet_id = EXCLUDED.wallet_id,
                order_id = EXCLUDED.order_id,
                amount = EXCLUDED.amount,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(payment.payment_id)
        .bind(payment.wallet_id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(payment.status.code())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(payment.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find_payment(&mut self, payment_id: Uuid) -> Result<Payment, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT payment_id, wallet_id, order_id, amount, status,
                    created_at, updated_at, deleted_at
             FROM payments WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        row.map(PaymentRow::into_payment)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(PAYMENT_AGGREGATE, payment_id))
    }
}

#[async_trait]
impl WalletRepository for PgPaymentProvider {
    async fn store_wallet(&mut self, wallet: &Wallet) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO wallets
                (wallet_id, user_id, balance, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (wallet_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                balance = EXCLUDED.balance,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(wallet.wallet_id)
        .bind(wallet.user_id)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .bind(wallet.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find_wallet(&mut self, wallet_id: Uuid) -> Result<Wallet, DomainError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT wallet_id, user_id, balance, created_at, updated_at, deleted_at
             FROM wallets WHERE wallet_id = $1",
        )
        .bind(wallet_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        row.map(Wallet::from)
            .ok_or_else(|| DomainError::not_found(WALLET_AGGREGATE, wallet_id))
    }

    async fn find_wallet_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, DomainError> {
        let row: Option<WalletRow> = sqlx::query_as(
            "SELECT wallet_id, user_id, balance, created_at, updated_at, deleted_at
             FROM wallets WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(row.map(Wallet::from))
    }
}

#[async_trait]
impl EventDispatcher for PgPaymentProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        outbox::append(&mut self.tx, SOURCE_APP, &envelope).await
    }
}
