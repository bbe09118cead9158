//! User projection service.
//!
//! Maintains the local copy of users this context notifies. Writes go
//! through the unit of work like any aggregate, but no events are
//! published — the projection is derived state, not a source of facts.

use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::uow::UnitOfWork;

use crate::domain::{ProjectedUser, ProjectedUserStatus, UserProjectionRepository};

const BASE_LOCK: &str = "notification_user_";

fn user_lock(user_id: Uuid) -> String {
    format!("{BASE_LOCK}{user_id}")
}

/// Application service for the projected users.
pub struct UserProjectionService<U> {
    uow: U,
}

impl<U> UserProjectionService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: UserProjectionRepository,
{
    /// Service over a unit of work.
    pub fn new(uow: U) -> Self {
        Self { uow }
    }

    /// Upsert a projected user. Replay-safe: storing the same snapshot
    /// twice leaves the projection unchanged.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn store_user(&self, user: ProjectedUser) -> Result<Uuid, DomainError> {
        let user_id = user.user_id;
        self.uow
            .execute_locked(vec![user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    provider.store_user(&user).await?;
                    Ok(user_id)
                })
            })
            .await
    }

    /// Load a projected user, if present.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<ProjectedUser>, DomainError> {
        self.uow
            .execute_locked(vec![user_lock(user_id)], move |provider| {
                Box::pin(async move { provider.find_user(user_id).await })
            })
            .await
    }

    /// Set a projected user's status. Returns whether the user was found;
    /// an absent user is a tolerated no-op, not an error.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn set_user_status(
        &self,
        user_id: Uuid,
        status: ProjectedUserStatus,
    ) -> Result<bool, DomainError> {
        self.uow
            .execute_locked(vec![user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    let Some(mut user) = provider.find_user(user_id).await? else {
                        return Ok(false);
                    };
                    if user.status != status {
                        user.status = status;
                        provider.store_user(&user).await?;
                    }
                    Ok(true)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_services;

    fn projected(user_id: Uuid) -> ProjectedUser {
        ProjectedUser {
            user_id,
            status: ProjectedUserStatus::Active,
            login: "bob".into(),
            email: Some("bob@example.com".into()),
            telegram: None,
        }
    }

    #[tokio::test]
    async fn store_twice_equals_store_once() {
        let (_, users, uow) = memory_services();
        let user_id = Uuid::now_v7();

        users.store_user(projected(user_id)).await.expect("first");
        let after_first = uow.read(|p| p.users.clone()).await;

        users.store_user(projected(user_id)).await.expect("second");
        let after_second = uow.read(|p| p.users.clone()).await;

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.len(), 1);
    }

    #[tokio::test]
    async fn set_status_tolerates_missing_users() {
        let (_, users, _uow) = memory_services();
        let found = users
            .set_user_status(Uuid::now_v7(), ProjectedUserStatus::Blocked)
            .await
            .expect("no-op");
        assert!(!found);
    }

    #[tokio::test]
    async fn set_status_updates_existing_projection() {
        let (_, users, _uow) = memory_services();
        let user_id = Uuid::now_v7();
        users.store_user(projected(user_id)).await.expect("store");

        let found = users
            .set_user_status(user_id, ProjectedUserStatus::Blocked)
            .await
            .expect("update");
        assert!(found);

        let user = users.find_user(user_id).await.expect("find").expect("present");
        assert_eq!(user.status, ProjectedUserStatus::Blocked);
    }
}
