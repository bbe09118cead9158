//! The user aggregate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;
use emporium_core::patch::Patch;

use super::events::{RemovedFields, UpdatedFields, UserCreated, UserDeleted, UserUpdated};

/// Aggregate kind for envelopes and error messages.
pub const AGGREGATE_TYPE: &str = "user";

/// User lifecycle status. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    /// No usable contact information or explicitly blocked.
    Blocked,
    /// Normal state.
    Active,
    /// Soft-deleted; no further mutations are accepted.
    Deleted,
}

impl UserStatus {
    /// Wire code of the status (stable integer enum).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Blocked => 0,
            Self::Active => 1,
            Self::Deleted => 2,
        }
    }

    /// Parse a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Blocked),
            1 => Some(Self::Active),
            2 => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Blocked => "Blocked",
            Self::Active => "Active",
            Self::Deleted => "Deleted",
        };
        f.write_str(name)
    }
}

// Statuses travel as integers on every wire surface.
impl Serialize for UserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for UserStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown user status code {code}")))
    }
}

/// The user aggregate root.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Unique identity.
    pub user_id: Uuid,
    /// Unique login, set at creation and policed forever.
    pub login: String,
    /// Lifecycle status.
    pub status: UserStatus,
    /// Optional email, unique while present.
    pub email: Option<String>,
    /// Optional telegram handle, unique while present.
    pub telegram: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete instant.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Field-level update with three-way optional semantics for contacts.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New status, if any.
    pub status: Option<UserStatus>,
    /// Email patch: keep, clear or set.
    pub email: Patch<String>,
    /// Telegram patch: keep, clear or set.
    pub telegram: Patch<String>,
}

impl User {
    /// Create a user, returning the aggregate and its creation fact.
    #[must_use]
    pub fn create(
        user_id: Uuid,
        login: String,
        email: Option<String>,
        telegram: Option<String>,
        status: UserStatus,
        now: DateTime<Utc>,
    ) -> (Self, UserCreated) {
        let user = Self {
            user_id,
            login,
            status,
            email,
            telegram,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let event = UserCreated {
            user_id,
            status: user.status,
            login: user.login.clone(),
            email: user.email.clone(),
            telegram: user.telegram.clone(),
            created_at: now.timestamp_millis(),
        };
        (user, event)
    }

    /// Apply a field-level update.
    ///
    /// Returns the `user_updated` fact describing what changed, or `None`
    /// when nothing changed (clearing an absent field, setting the same
    /// value) — no event is published for no-ops.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidStateTransition`] when the user is deleted;
    /// the lifecycle is otherwise unconstrained.
    pub fn apply_update(
        &mut self,
        update: UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<UserUpdated>, DomainError> {
        if self.status == UserStatus::Deleted {
            let to = update.status.unwrap_or(self.status);
            return Err(DomainError::InvalidStateTransition {
                entity: AGGREGATE_TYPE,
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        let mut updated = UpdatedFields::default();
        let mut removed = RemovedFields::default();

        if let Some(status) = update.status {
            if status != self.status {
                self.status = status;
                updated.status = Some(status);
            }
        }

        let email_was_present = self.email.is_some();
        match &update.email {
            Patch::Set(_) => {
                if update.email.clone().apply(&mut self.email) {
                    updated.email = self.email.clone();
                }
            }
            Patch::Clear => {
                if update.email.clone().apply(&mut self.email) {
                    removed.email = email_was_present.then_some(true);
                }
            }
            Patch::Keep => {}
        }

        let telegram_was_present = self.telegram.is_some();
        match &update.telegram {
            Patch::Set(_) => {
                if update.telegram.clone().apply(&mut self.telegram) {
                    updated.telegram = self.telegram.clone();
                }
            }
            Patch::Clear => {
                if update.telegram.clone().apply(&mut self.telegram) {
                    removed.telegram = telegram_was_present.then_some(true);
                }
            }
            Patch::Keep => {}
        }

        if updated.is_empty() && removed.is_empty() {
            return Ok(None);
        }

        self.updated_at = now;
        Ok(Some(UserUpdated {
            user_id: self.user_id,
            updated_fields: (!updated.is_empty()).then_some(updated),
            removed_fields: (!removed.is_empty()).then_some(removed),
            updated_at: now.timestamp_millis(),
        }))
    }

    /// Soft-delete the user.
    ///
    /// Idempotent: deleting an already-deleted user returns `None` and
    /// publishes nothing.
    #[must_use]
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> Option<UserDeleted> {
        if self.status == UserStatus::Deleted {
            return None;
        }
        self.status = UserStatus::Deleted;
        self.deleted_at = Some(now);
        self.updated_at = now;
        Some(UserDeleted {
            user_id: self.user_id,
            status: self.status,
            deleted_at: now.timestamp_millis(),
            hard: false,
        })
    }
}

/// Repository contract for the user aggregate.
///
/// `store` is an upsert by primary key. Lookups by unique field back the
/// uniqueness checks done under the corresponding named locks.
#[async_trait]
pub trait UserRepository: Send {
    /// Time-ordered identity for a new user.
    fn next_id(&mut self) -> Uuid {
        Uuid::now_v7()
    }

    /// Upsert the aggregate.
    async fn store(&mut self, user: &User) -> Result<(), DomainError>;

    /// Load by id.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotFound`] when no such user exists.
    async fn find(&mut self, user_id: Uuid) -> Result<User, DomainError>;

    /// Lookup by login.
    async fn find_by_login(&mut self, login: &str) -> Result<Option<User>, DomainError>;

    /// Lookup by email.
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError>;

    /// Lookup by telegram handle.
    async fn find_by_telegram(&mut self, telegram: &str) -> Result<Option<User>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid")
    }

    fn user() -> User {
        User::create(
            Uuid::now_v7(),
            "bob".into(),
            Some("bob@example.com".into()),
            None,
            UserStatus::Active,
            now(),
        )
        .0
    }

    #[test]
    fn create_emits_full_snapshot() {
        let (user, event) = User::create(
            Uuid::now_v7(),
            "bob".into(),
            Some("bob@example.com".into()),
            Some("@bob".into()),
            UserStatus::Blocked,
            now(),
        );
        assert_eq!(event.user_id, user.user_id);
        assert_eq!(event.login, "bob");
        assert_eq!(event.status, UserStatus::Blocked);
        assert_eq!(event.email.as_deref(), Some("bob@example.com"));
        assert_eq!(event.created_at, now().timestamp_millis());
    }

    #[test]
    fn clearing_absent_email_is_a_noop() {
        let mut user = user();
        user.email = None;
        let event = user
            .apply_update(
                UserUpdate {
                    email: Patch::Clear,
                    ..UserUpdate::default()
                },
                now(),
            )
            .expect("update");
        assert!(event.is_none());
    }

    #[test]
    fn clearing_present_email_reports_removed_field() {
        let mut user = user();
        let event = user
            .apply_update(
                UserUpdate {
                    email: Patch::Clear,
                    ..UserUpdate::default()
                },
                now(),
            )
            .expect("update")
            .expect("changed");
        assert_eq!(user.email, None);
        assert_eq!(event.removed_fields.expect("removed").email, Some(true));
        assert!(event.updated_fields.is_none());
    }

    #[test]
    fn setting_new_contact_reports_updated_field() {
        let mut user = user();
        let event = user
            .apply_update(
                UserUpdate {
                    telegram: Patch::Set("@bob".into()),
                    ..UserUpdate::default()
                },
                now(),
            )
            .expect("update")
            .expect("changed");
        let updated = event.updated_fields.expect("updated");
        assert_eq!(updated.telegram.as_deref(), Some("@bob"));
        assert!(event.removed_fields.is_none());
    }

    #[test]
    fn setting_same_email_publishes_nothing() {
        let mut user = user();
        let event = user
            .apply_update(
                UserUpdate {
                    email: Patch::Set("bob@example.com".into()),
                    ..UserUpdate::default()
                },
                now(),
            )
            .expect("update");
        assert!(event.is_none());
    }

    #[test]
    fn status_transitions_are_unconstrained_until_deleted() {
        let mut user = user();
        for status in [UserStatus::Blocked, UserStatus::Active, UserStatus::Blocked] {
            let event = user
                .apply_update(
                    UserUpdate {
                        status: Some(status),
                        ..UserUpdate::default()
                    },
                    now(),
                )
                .expect("update")
                .expect("changed");
            assert_eq!(event.updated_fields.expect("updated").status, Some(status));
        }
    }

    #[test]
    fn deleted_user_rejects_updates() {
        let mut user = user();
        assert!(user.mark_deleted(now()).is_some());
        let err = user
            .apply_update(
                UserUpdate {
                    status: Some(UserStatus::Active),
                    ..UserUpdate::default()
                },
                now(),
            )
            .expect_err("deleted is terminal");
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut user = user();
        let first = user.mark_deleted(now()).expect("first delete");
        assert!(!first.hard);
        assert_eq!(first.status, UserStatus::Deleted);
        assert!(user.mark_deleted(now()).is_none());
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [UserStatus::Blocked, UserStatus::Active, UserStatus::Deleted] {
            assert_eq!(UserStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(UserStatus::from_code(9), None);
    }
}
