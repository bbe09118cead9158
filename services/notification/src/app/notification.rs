//! Notification application service.

use std::sync::Arc;

use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::uow::UnitOfWork;

use crate::domain::{Notification, NotificationPayload, NotificationRepository, AGGREGATE_TYPE};

const BASE_LOCK: &str = "notification_";

fn notification_lock(id: Uuid) -> String {
    format!("{BASE_LOCK}{id}")
}

/// Application service for the notification aggregate.
pub struct NotificationAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
}

impl<U> NotificationAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: NotificationRepository + EventDispatcher,
{
    /// Service over a unit of work.
    pub fn new(uow: U, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }

    /// Record a pending notification.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for an empty destination.
    pub async fn create_notification(
        &self,
        payload: NotificationPayload,
    ) -> Result<Uuid, DomainError> {
        if payload.email.is_empty() {
            return Err(DomainError::InvalidArgument(
                "notification email must not be empty".to_string(),
            ));
        }
        let now = self.clock.now();
        self.uow
            .execute(move |provider| {
                Box::pin(async move {
                    let id = provider.next_id();
                    let (notification, event) = Notification::create(id, payload, now);
                    provider.store(&notification).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                    Ok(id)
                })
            })
            .await
    }

    /// Record the delivery outcome. Single-shot per notification.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown notifications,
    /// [`DomainError::InvalidStateTransition`] when already executed.
    pub async fn mark_as_executed(&self, id: Uuid, success: bool) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![notification_lock(id)], move |provider| {
                Box::pin(async move {
                    let mut notification = provider.find(id).await?;
                    let event = notification.mark_as_executed(success, now)?;
                    provider.store(&notification).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Soft-delete a notification. Idempotent.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn remove_notification(&self, id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![notification_lock(id)], move |provider| {
                Box::pin(async move {
                    let mut notification = match provider.find(id).await {
                        Ok(notification) => notification,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = notification.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store(&notification).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Load a notification.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown notifications.
    pub async fn find_notification(&self, id: Uuid) -> Result<Notification, DomainError> {
        self.uow
            .execute_locked(vec![notification_lock(id)], move |provider| {
                Box::pin(async move { provider.find(id).await })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_services;

    fn payload() -> NotificationPayload {
        NotificationPayload {
            email: "bob@example.com".into(),
            message: "User Created".into(),
        }
    }

    #[tokio::test]
    async fn create_stores_pending_notification_with_fact() {
        let (notifications, _, uow) = memory_services();
        let id = notifications
            .create_notification(payload())
            .await
            .expect("create");

        let found = notifications.find_notification(id).await.expect("find");
        assert!(found.status.is_none());
        assert!(found.executed_at.is_none());

        let types = uow
            .read(|p| p.outbox.iter().map(|e| e.event_type.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(types, vec!["NotificationCreated".to_string()]);
    }

    #[tokio::test]
    async fn execution_is_single_shot_and_rolls_back_second_attempt() {
        let (notifications, _, uow) = memory_services();
        let id = notifications
            .create_notification(payload())
            .await
            .expect("create");

        notifications.mark_as_executed(id, true).await.expect("first");
        let err = notifications
            .mark_as_executed(id, false)
            .await
            .expect_err("single shot");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let status_changes = uow
            .read(|p| {
                p.outbox
                    .iter()
                    .filter(|e| e.event_type == "NotificationStatusChanged")
                    .count()
            })
            .await;
        assert_eq!(status_changes, 1);
    }

    #[tokio::test]
    async fn empty_destination_is_rejected() {
        let (notifications, _, _uow) = memory_services();
        let err = notifications
            .create_notification(NotificationPayload {
                email: String::new(),
                message: "hi".into(),
            })
            .await
            .expect_err("empty email");
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }
}
