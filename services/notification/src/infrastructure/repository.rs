//! Postgres-backed repository provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_postgres::outbox;
use emporium_postgres::unit_of_work::{PgTransaction, TxProvider};

use crate::domain::{
    Notification, NotificationPayload, NotificationRepository, NotificationStatus, ProjectedUser,
    ProjectedUserStatus, UserProjectionRepository, AGGREGATE_TYPE,
};
use crate::SOURCE_APP;

/// Repositories of the notification context bound to one transaction.
pub struct PgNotificationProvider {
    tx: PgTransaction,
}

impl TxProvider for PgNotificationProvider {
    fn from_tx(tx: PgTransaction) -> Self {
        Self { tx }
    }

    fn into_tx(self) -> PgTransaction {
        self.tx
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    email: String,
    message: String,
    executed_at: Option<DateTime<Utc>>,
    status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, DomainError> {
        let status = match self.status.as_deref() {
            None => None,
            Some("Success") => Some(NotificationStatus::Success),
            Some("Failed") => Some(NotificationStatus::Failed),
            Some(other) => {
                return Err(DomainError::Internal(format!(
                    "corrupt notification status {other}"
                )))
            }
        };
        Ok(Notification {
            id: self.id,
            payload: NotificationPayload {
                email: self.email,
                message: self.message,
            },
            executed_at: self.executed_at,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationProvider {
    async fn store(&mut self, notification: &Notification) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO notifications
                (id, email, message, executed_at, status, created_at, updated_at, deleted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                message = EXCLUDED.message,
                executed_at = EXCLUDED.executed_at,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at",
        )
        .bind(notification.id)
        .bind(&notification.payload.email)
        .bind(&notification.payload.message)
        .bind(notification.executed_at)
        .bind(notification.status.map(|s| s.to_string()))
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .bind(notification.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find(&mut self, id: Uuid) -> Result<Notification, DomainError> {
        let row: Option<NotificationRow> = sqlx::query_as(
            "SELECT id, email, message, executed_at, status,
                    created_at, updated_at, deleted_at
             FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        row.map(NotificationRow::into_notification)
            .transpose()?
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, id))
    }
}

#[derive(FromRow)]
struct ProjectedUserRow {
    user_id: Uuid,
    status: i32,
    login: String,
    email: Option<String>,
    telegram: Option<String>,
}

impl ProjectedUserRow {
    fn into_user(self) -> Result<ProjectedUser, DomainError> {
        let status = ProjectedUserStatus::from_code(self.status).ok_or_else(|| {
            DomainError::Internal(format!("corrupt projected user status {}", self.status))
        })?;
        Ok(ProjectedUser {
            user_id: self.user_id,
            status,
            login: self.login,
            email: self.email,
            telegram: self.telegram,
        })
    }
}

#[async_trait]
impl UserProjectionRepository for PgNotificationProvider {
    async fn store_user(&mut self, user: &ProjectedUser) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO users (user_id, status, login, email, telegram)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE SET
                status = EXCLUDED.status,
                login = EXCLUDED.login,
                email = EXCLUDED.email,
                telegram = EXCLUDED.telegram",
        )
        .bind(user.user_id)
        .bind(user.status.code())
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.telegram)
        .execute(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        Ok(())
    }

    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<ProjectedUser>, DomainError> {
        let row: Option<ProjectedUserRow> = sqlx::query_as(
            "SELECT user_id, status, login, email, telegram FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DomainError::internal)?;
        row.map(ProjectedUserRow::into_user).transpose()
    }
}

#[async_trait]
impl EventDispatcher for PgNotificationProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        outbox::append(&mut self.tx, SOURCE_APP, &envelope).await
    }
}
