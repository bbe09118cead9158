//! User application service.
//!
//! Each operation builds its lock-name set, runs a unit-of-work body that
//! loads, validates, mutates and stores the aggregate, and dispatches the
//! resulting fact through the transactional outbox. Uniqueness of login,
//! email and telegram is enforced by lookups executed under the
//! corresponding named locks, so concurrent creates race on the lock, not
//! on the check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use emporium_core::clock::Clock;
use emporium_core::error::DomainError;
use emporium_core::event::{dispatch_event, EventDispatcher};
use emporium_core::patch::Patch;
use emporium_core::uow::UnitOfWork;

use crate::domain::{User, UserRepository, UserStatus, UserUpdate, AGGREGATE_TYPE};

const BASE_LOCK: &str = "user_";

fn user_lock(user_id: Uuid) -> String {
    format!("{BASE_LOCK}{user_id}")
}

fn login_lock(login: &str) -> String {
    format!("{BASE_LOCK}login_{login}")
}

fn email_lock(email: &str) -> String {
    format!("{BASE_LOCK}email_{email}")
}

fn telegram_lock(telegram: &str) -> String {
    format!("{BASE_LOCK}telegram_{telegram}")
}

/// Input of `CreateUser`.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique login.
    pub login: String,
    /// Optional email.
    pub email: Option<String>,
    /// Optional telegram handle.
    pub telegram: Option<String>,
    /// Initial status; defaults to Blocked.
    pub status: Option<UserStatus>,
}

/// Read model returned by `FindUser`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    /// User id.
    pub user_id: Uuid,
    /// Login.
    pub login: String,
    /// Lifecycle status.
    pub status: UserStatus,
    /// Email, if set.
    pub email: Option<String>,
    /// Telegram, if set.
    pub telegram: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant, if deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            login: user.login,
            status: user.status,
            email: user.email,
            telegram: user.telegram,
            created_at: user.created_at,
            updated_at: user.updated_at,
            deleted_at: user.deleted_at,
        }
    }
}

/// Application service for the user aggregate.
pub struct UserAppService<U> {
    uow: U,
    clock: Arc<dyn Clock>,
}

impl<U> UserAppService<U>
where
    U: UnitOfWork + 'static,
    U::Provider: UserRepository + EventDispatcher,
{
    /// Service over a unit of work.
    pub fn new(uow: U, clock: Arc<dyn Clock>) -> Self {
        Self { uow, clock }
    }

    /// Create a user, enforcing login/email/telegram uniqueness.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidArgument`] for an empty login,
    /// [`DomainError::AlreadyExists`] when a unique field is taken.
    pub async fn create_user(&self, new_user: NewUser) -> Result<Uuid, DomainError> {
        if new_user.login.is_empty() {
            return Err(DomainError::InvalidArgument(
                "login must not be empty".to_string(),
            ));
        }

        let mut locks = vec![login_lock(&new_user.login)];
        if let Some(email) = &new_user.email {
            locks.push(email_lock(email));
        }
        if let Some(telegram) = &new_user.telegram {
            locks.push(telegram_lock(telegram));
        }

        let now = self.clock.now();
        self.uow
            .execute_locked(locks, move |provider| {
                Box::pin(async move {
                    if provider.find_by_login(&new_user.login).await?.is_some() {
                        return Err(DomainError::AlreadyExists {
                            entity: AGGREGATE_TYPE,
                            field: "login",
                            value: new_user.login,
                        });
                    }
                    if let Some(email) = &new_user.email {
                        if provider.find_by_email(email).await?.is_some() {
                            return Err(DomainError::AlreadyExists {
                                entity: AGGREGATE_TYPE,
                                field: "email",
                                value: email.clone(),
                            });
                        }
                    }
                    if let Some(telegram) = &new_user.telegram {
                        if provider.find_by_telegram(telegram).await?.is_some() {
                            return Err(DomainError::AlreadyExists {
                                entity: AGGREGATE_TYPE,
                                field: "telegram",
                                value: telegram.clone(),
                            });
                        }
                    }

                    let user_id = provider.next_id();
                    let status = new_user.status.unwrap_or(UserStatus::Blocked);
                    let (user, event) = User::create(
                        user_id,
                        new_user.login,
                        new_user.email,
                        new_user.telegram,
                        status,
                        now,
                    );
                    provider.store(&user).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await?;
                    Ok(user_id)
                })
            })
            .await
    }

    /// Apply a field-level update.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown users,
    /// [`DomainError::AlreadyExists`] when a new contact value is taken,
    /// [`DomainError::InvalidStateTransition`] for deleted users.
    pub async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<(), DomainError> {
        let mut locks = vec![user_lock(user_id)];
        if let Patch::Set(email) = &update.email {
            locks.push(email_lock(email));
        }
        if let Patch::Set(telegram) = &update.telegram {
            locks.push(telegram_lock(telegram));
        }

        let now = self.clock.now();
        self.uow
            .execute_locked(locks, move |provider| {
                Box::pin(async move {
                    let mut user = provider.find(user_id).await?;

                    if let Patch::Set(email) = &update.email {
                        if let Some(existing) = provider.find_by_email(email).await? {
                            if existing.user_id != user_id {
                                return Err(DomainError::AlreadyExists {
                                    entity: AGGREGATE_TYPE,
                                    field: "email",
                                    value: email.clone(),
                                });
                            }
                        }
                    }
                    if let Patch::Set(telegram) = &update.telegram {
                        if let Some(existing) = provider.find_by_telegram(telegram).await? {
                            if existing.user_id != user_id {
                                return Err(DomainError::AlreadyExists {
                                    entity: AGGREGATE_TYPE,
                                    field: "telegram",
                                    value: telegram.clone(),
                                });
                            }
                        }
                    }

                    let Some(event) = user.apply_update(update, now)? else {
                        return Ok(());
                    };
                    provider.store(&user).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Block a user.
    ///
    /// # Errors
    ///
    /// Same as [`UserAppService::update_user`].
    pub async fn block_user(&self, user_id: Uuid) -> Result<(), DomainError> {
        self.update_user(
            user_id,
            UserUpdate {
                status: Some(UserStatus::Blocked),
                ..UserUpdate::default()
            },
        )
        .await
    }

    /// Soft-delete a user. Idempotent: unknown or already-deleted users
    /// return success without publishing.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), DomainError> {
        let now = self.clock.now();
        self.uow
            .execute_locked(vec![user_lock(user_id)], move |provider| {
                Box::pin(async move {
                    let mut user = match provider.find(user_id).await {
                        Ok(user) => user,
                        Err(err) if err.is_not_found() => return Ok(()),
                        Err(err) => return Err(err),
                    };
                    let Some(event) = user.mark_deleted(now) else {
                        return Ok(());
                    };
                    provider.store(&user).await?;
                    dispatch_event(provider, AGGREGATE_TYPE, &event).await
                })
            })
            .await
    }

    /// Load a user.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] for unknown users.
    pub async fn find_user(&self, user_id: Uuid) -> Result<UserData, DomainError> {
        self.uow
            .execute_locked(vec![user_lock(user_id)], move |provider| {
                Box::pin(async move { provider.find(user_id).await.map(UserData::from) })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::memory_service;

    fn new_user(login: &str) -> NewUser {
        NewUser {
            login: login.to_string(),
            email: Some(format!("{login}@example.com")),
            telegram: None,
            status: Some(UserStatus::Active),
        }
    }

    #[tokio::test]
    async fn create_then_find_returns_the_created_user() {
        let (service, _uow) = memory_service();
        let user_id = service.create_user(new_user("bob")).await.expect("create");

        let found = service.find_user(user_id).await.expect("find");
        assert_eq!(found.login, "bob");
        assert_eq!(found.status, UserStatus::Active);
        assert_eq!(found.email.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn successful_create_writes_exactly_one_outbox_row() {
        let (service, uow) = memory_service();
        service.create_user(new_user("bob")).await.expect("create");

        let (users, outbox) = uow
            .read(|p| (p.users.len(), p.outbox.clone()))
            .await;
        assert_eq!(users, 1);
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].event_type, "user_created");
    }

    #[tokio::test]
    async fn duplicate_login_is_rejected_and_rolls_back() {
        let (service, uow) = memory_service();
        service.create_user(new_user("bob")).await.expect("first");

        let err = service
            .create_user(NewUser {
                email: Some("other@example.com".into()),
                ..new_user("bob")
            })
            .await
            .expect_err("duplicate login");
        assert!(matches!(err, DomainError::AlreadyExists { field: "login", .. }));

        let (users, outbox_len) = uow.read(|p| (p.users.len(), p.outbox.len())).await;
        assert_eq!(users, 1);
        assert_eq!(outbox_len, 1);
    }

    #[tokio::test]
    async fn concurrent_duplicate_logins_leave_exactly_one_user() {
        let (service, uow) = memory_service();
        let service = Arc::new(service);

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.create_user(new_user("race")).await })
        };
        let second = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_user(NewUser {
                        email: Some("second@example.com".into()),
                        ..new_user("race")
                    })
                    .await
            })
        };

        let results = [first.await.expect("join"), second.await.expect("join")];
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| {
                matches!(r, Err(DomainError::AlreadyExists { field: "login", .. }))
            })
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(uow.read(|p| p.users.len()).await, 1);
    }

    #[tokio::test]
    async fn taken_email_is_rejected_for_other_users_but_not_self() {
        let (service, _uow) = memory_service();
        let bob = service.create_user(new_user("bob")).await.expect("bob");
        service.create_user(new_user("eve")).await.expect("eve");

        // Re-setting bob's own email is a no-op, not a conflict.
        service
            .update_user(
                bob,
                UserUpdate {
                    email: Patch::Set("bob@example.com".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .expect("self update");

        let err = service
            .update_user(
                bob,
                UserUpdate {
                    email: Patch::Set("eve@example.com".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .expect_err("taken email");
        assert!(matches!(err, DomainError::AlreadyExists { field: "email", .. }));
    }

    #[tokio::test]
    async fn noop_update_publishes_nothing() {
        let (service, uow) = memory_service();
        let user_id = service
            .create_user(NewUser {
                login: "bob".into(),
                email: None,
                telegram: None,
                status: None,
            })
            .await
            .expect("create");

        service
            .update_user(
                user_id,
                UserUpdate {
                    email: Patch::Clear,
                    ..UserUpdate::default()
                },
            )
            .await
            .expect("noop update");

        let types = uow
            .read(|p| p.outbox.iter().map(|e| e.event_type.clone()).collect::<Vec<_>>())
            .await;
        assert_eq!(types, vec!["user_created".to_string()]);
    }

    #[tokio::test]
    async fn delete_twice_publishes_at_most_one_removed_event() {
        let (service, uow) = memory_service();
        let user_id = service.create_user(new_user("bob")).await.expect("create");

        service.delete_user(user_id).await.expect("first delete");
        service.delete_user(user_id).await.expect("second delete");
        // Unknown users are also fine.
        service.delete_user(Uuid::now_v7()).await.expect("unknown");

        let deleted_events = uow
            .read(|p| {
                p.outbox
                    .iter()
                    .filter(|e| e.event_type == "user_deleted")
                    .count()
            })
            .await;
        assert_eq!(deleted_events, 1);
    }

    #[tokio::test]
    async fn update_on_missing_user_is_not_found() {
        let (service, _uow) = memory_service();
        let err = service
            .update_user(Uuid::now_v7(), UserUpdate::default())
            .await
            .expect_err("missing user");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn blocked_then_deleted_lifecycle() {
        let (service, _uow) = memory_service();
        let user_id = service.create_user(new_user("bob")).await.expect("create");

        service.block_user(user_id).await.expect("block");
        assert_eq!(
            service.find_user(user_id).await.expect("find").status,
            UserStatus::Blocked
        );

        service.delete_user(user_id).await.expect("delete");
        let err = service.block_user(user_id).await.expect_err("terminal");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
