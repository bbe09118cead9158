//! In-memory provider for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_testing::{test_clock, InMemoryUnitOfWork};

use crate::app::{NotificationAppService, UserProjectionService};
use crate::domain::{
    Notification, NotificationRepository, ProjectedUser, UserProjectionRepository, AGGREGATE_TYPE,
};

/// In-memory notification-context repositories plus recorded outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationProvider {
    /// Stored notifications by id.
    pub notifications: HashMap<Uuid, Notification>,
    /// Projected users by id.
    pub users: HashMap<Uuid, ProjectedUser>,
    /// Envelopes dispatched by committed bodies.
    pub outbox: Vec<EventEnvelope>,
}

#[async_trait]
impl NotificationRepository for MemoryNotificationProvider {
    async fn store(&mut self, notification: &Notification) -> Result<(), DomainError> {
        self.notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn find(&mut self, id: Uuid) -> Result<Notification, DomainError> {
        self.notifications
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, id))
    }
}

#[async_trait]
impl UserProjectionRepository for MemoryNotificationProvider {
    async fn store_user(&mut self, user: &ProjectedUser) -> Result<(), DomainError> {
        self.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<ProjectedUser>, DomainError> {
        Ok(self.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl EventDispatcher for MemoryNotificationProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.outbox.push(envelope);
        Ok(())
    }
}

/// Unit of work over the in-memory provider.
pub type MemoryNotificationUow = InMemoryUnitOfWork<MemoryNotificationProvider>;

/// Notification and projection services over shared in-memory state.
#[must_use]
pub fn memory_services() -> (
    NotificationAppService<MemoryNotificationUow>,
    UserProjectionService<MemoryNotificationUow>,
    MemoryNotificationUow,
) {
    let uow = MemoryNotificationUow::default();
    let notifications = NotificationAppService::new(uow.clone(), Arc::new(test_clock()));
    let users = UserProjectionService::new(uow.clone());
    (notifications, users, uow)
}
