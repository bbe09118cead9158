//! In-memory provider for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::event::{EventDispatcher, EventEnvelope};
use emporium_testing::{test_clock, InMemoryUnitOfWork};

use crate::app::UserAppService;
use crate::domain::{User, UserRepository, AGGREGATE_TYPE};

/// In-memory user repository plus recorded outbox.
///
/// Lives inside the snapshot-rolled-back unit-of-work state, so stores and
/// dispatched envelopes commit or roll back together.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserProvider {
    /// Stored users by id.
    pub users: HashMap<Uuid, User>,
    /// Envelopes dispatched by committed bodies.
    pub outbox: Vec<EventEnvelope>,
}

#[async_trait]
impl UserRepository for MemoryUserProvider {
    async fn store(&mut self, user: &User) -> Result<(), DomainError> {
        self.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find(&mut self, user_id: Uuid) -> Result<User, DomainError> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(AGGREGATE_TYPE, user_id))
    }

    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DomainError> {
        Ok(self.users.values().find(|u| u.login == login).cloned())
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_telegram(&mut self, telegram: &str) -> Result<Option<User>, DomainError> {
        Ok(self
            .users
            .values()
            .find(|u| u.telegram.as_deref() == Some(telegram))
            .cloned())
    }
}

#[async_trait]
impl EventDispatcher for MemoryUserProvider {
    async fn dispatch(&mut self, envelope: EventEnvelope) -> Result<(), DomainError> {
        self.outbox.push(envelope);
        Ok(())
    }
}

/// Unit of work over the in-memory provider.
pub type MemoryUserUow = InMemoryUnitOfWork<MemoryUserProvider>;

/// App service over fresh in-memory state, plus a handle for assertions.
#[must_use]
pub fn memory_service() -> (UserAppService<MemoryUserUow>, MemoryUserUow) {
    let uow = MemoryUserUow::default();
    let service = UserAppService::new(uow.clone(), Arc::new(test_clock()));
    (service, uow)
}
