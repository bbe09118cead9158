//! User lifecycle facts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::event::DomainEvent;

use super::user::UserStatus;

/// `user_created` — full snapshot of a new user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    /// New user's id.
    pub user_id: Uuid,
    /// Initial status.
    pub status: UserStatus,
    /// Login.
    pub login: String,
    /// Email, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Telegram, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    /// Creation instant, epoch milliseconds.
    pub created_at: i64,
}

impl DomainEvent for UserCreated {
    fn event_type(&self) -> &'static str {
        "user_created"
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Fields set by an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatedFields {
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    /// New email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New telegram.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

impl UpdatedFields {
    /// Whether nothing was set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.email.is_none() && self.telegram.is_none()
    }
}

/// Fields cleared by an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovedFields {
    /// Email was cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    /// Telegram was cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<bool>,
}

impl RemovedFields {
    /// Whether nothing was cleared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.telegram.is_none()
    }
}

/// `user_updated` — field-level diff of an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    /// Updated user's id.
    pub user_id: Uuid,
    /// Fields that were set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_fields: Option<UpdatedFields>,
    /// Fields that were cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_fields: Option<RemovedFields>,
    /// Update instant, epoch milliseconds.
    pub updated_at: i64,
}

impl DomainEvent for UserUpdated {
    fn event_type(&self) -> &'static str {
        "user_updated"
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// `user_deleted` — lifecycle end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeleted {
    /// Deleted user's id.
    pub user_id: Uuid,
    /// Status after deletion.
    pub status: UserStatus,
    /// Deletion instant, epoch milliseconds.
    pub deleted_at: i64,
    /// Whether the row was physically removed.
    pub hard: bool,
}

impl DomainEvent for UserDeleted {
    fn event_type(&self) -> &'static str {
        "user_deleted"
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_created_serializes_with_integer_status_and_epoch_millis() {
        let event = UserCreated {
            user_id: Uuid::nil(),
            status: UserStatus::Active,
            login: "bob".into(),
            email: None,
            telegram: Some("@bob".into()),
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["status"], 1);
        assert_eq!(json["created_at"], 1_700_000_000_000_i64);
        assert!(json.get("email").is_none());
        assert_eq!(json["telegram"], "@bob");
    }

    #[test]
    fn user_updated_omits_empty_sections() {
        let event = UserUpdated {
            user_id: Uuid::nil(),
            updated_fields: None,
            removed_fields: Some(RemovedFields {
                email: Some(true),
                telegram: None,
            }),
            updated_at: 0,
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert!(json.get("updated_fields").is_none());
        assert_eq!(json["removed_fields"]["email"], true);
    }
}
