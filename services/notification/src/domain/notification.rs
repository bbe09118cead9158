//! The notification aggregate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;

use super::events::{NotificationCreated, NotificationRemoved, NotificationStatusChanged};

/// Aggregate kind for envelopes and error messages.
pub const AGGREGATE_TYPE: &str = "notification";

/// Outcome of a delivery attempt. Both values are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    /// The notification went out.
    Success,
    /// Delivery failed.
    Failed,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// What to send and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Destination address.
    pub email: String,
    /// Message body.
    pub message: String,
}

/// The notification aggregate root.
///
/// Invariant: `status` and `executed_at` are either both unset (pending)
/// or both set (executed).
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Unique identity.
    pub id: Uuid,
    /// What to send.
    pub payload: NotificationPayload,
    /// When execution happened.
    pub executed_at: Option<DateTime<Utc>>,
    /// How execution went.
    pub status: Option<NotificationStatus>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Create a pending notification.
    #[must_use]
    pub fn create(
        id: Uuid,
        payload: NotificationPayload,
        now: DateTime<Utc>,
    ) -> (Self, NotificationCreated) {
        let notification = Self {
            id,
            payload: payload.clone(),
            executed_at: None,
            status: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let event = NotificationCreated {
            notification_id: id,
            email: payload.email,
            message: payload.message,
        };
        (notification, event)
    }

    /// Record the delivery outcome. Single-shot: a second call is rejected.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidStateTransition`] when the notification is
    /// already executed.
    pub fn mark_as_executed(
        &mut self,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<NotificationStatusChanged, DomainError> {
        if let Some(current) = self.status {
            return Err(DomainError::InvalidStateTransition {
                entity: AGGREGATE_TYPE,
                from: current.to_string(),
                to: if success { "Success" } else { "Failed" }.to_string(),
            });
        }
        let status = if success {
            NotificationStatus::Success
        } else {
            NotificationStatus::Failed
        };
        self.status = Some(status);
        self.executed_at = Some(now);
        self.updated_at = now;
        Ok(NotificationStatusChanged {
            notification_id: self.id,
            status,
        })
    }

    /// Soft-delete the notification. Idempotent.
    #[must_use]
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Option<NotificationRemoved> {
        if self.deleted_at.is_some() {
            return None;
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Some(NotificationRemoved {
            notification_id: self.id,
        })
    }
}

/// Repository contract for notifications.
#[async_trait]
pub trait NotificationRepository: Send {
    /// Time-ordered identity for a new notification.
    fn next_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }

    /// Upsert the aggregate.
    async fn store(&mut self, notification: &Notification) -> Result<(), DomainError>;

    /// Load by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such notification exists.
    async fn find(&mut self, id: Uuid) -> Result<Notification, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid")
    }

    fn pending() -> Notification {
        Notification::create(
            Uuid::now_v7(),
            NotificationPayload {
                email: "bob@example.com".into(),
                message: "User Created".into(),
            },
            now(),
        )
        .0
    }

    #[test]
    fn pending_has_neither_status_nor_execution_time() {
        let notification = pending();
        assert!(notification.status.is_none());
        assert!(notification.executed_at.is_none());
    }

    #[test]
    fn execution_sets_both_fields_together() {
        let mut notification = pending();
        let event = notification.mark_as_executed(true, now()).expect("first");
        assert_eq!(event.status, NotificationStatus::Success);
        assert_eq!(notification.status, Some(NotificationStatus::Success));
        assert_eq!(notification.executed_at, Some(now()));
    }

    #[test]
    fn execution_is_single_shot() {
        let mut notification = pending();
        notification.mark_as_executed(false, now()).expect("first");
        let err = notification
            .mark_as_executed(true, now())
            .expect_err("second execution");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(notification.status, Some(NotificationStatus::Failed));
    }
}
