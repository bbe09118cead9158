//! Postgres-backed repository provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_postgres::outbox;
use emporium_postgres::unit_of_work::{PgTransaction, TxProvider};

use crate::domain::{User, UserRepository, UserStatus, AGGREGATE_TYPE};
use crate::SOURCE_APP;

/// Repositories of the user context bound to one transaction.
pub struct PgUserProvider {
    tx: PgTransaction,
}

impl TxProvider for PgUserProvider {
    fn from_tx(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn into_tx(self) -> PgTransaction {
        self.tx
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    login: String,
    status: i32,
    email: Option<String>,
    telegram: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_user(self) -> Result<User, DomainError> {
        let status = UserStatus::from_code(self.status).ok_or_else(|| {
            DomainError::Internal(format!("corrupt user status {}", self.status))
        })?;
        Ok(User {
            user_id: self.user_id,
            login: self.login,
            status,
            email: self.email,
            telegram: self.telegram,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

const SELECT_USER: &str = "SELECT user_id, login, status, email, telegram, \
                           created_at, updated_at, deleted_at FROM users";

impl PgUserProvider {
    async fn find_where(
        &mut self,
        clause: &str,
        value: &str,
    ) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE {clause} = $1"))
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DomainError::internal)?;
        row.map(UserRow::into_user).transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserProvider {
    async fn store(&mut self, user: &User) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO users
                (user_id, login, status, email, telegram, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id) DO UPDATE SET
                login = EXCLUDED.login,
                status = EXCLUDED.status,
                email = EXCLUDED.email,
                telegram = EXCLUDED.telegram,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(user.user_id)
        .bind(&user.login)
        .bind(user.status.code())
        .bind(&user.email)
        .bind(&user.telegram)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find(&mut self, user_id: Uuid) -> Result<User, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DomainError::internal)?;
        row.map(UserRow::into_user)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, user_id))
    }

    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DomainError> {
        self.find_where("login", login).await
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError> {
        self.find_where("email", email).await
    }

    async fn find_by_telegram(&mut self, telegram: &str) -> Result<Option<User>, DomainError> {
        self.find_where("telegram", telegram).await
    }
}

#[async_trait]
impl EventDispatcher for PgUserProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        outbox::append(&mut self.tx, SOURCE_APP, &envelope).await
    }
}
