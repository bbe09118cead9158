//! Workflows owned by the notification service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_workflow::{Worker, WorkflowContext, WorkflowError};

use crate::domain::{NotificationPayload, ProjectedUser, ProjectedUserStatus};

/// Workflow name for the `user_created` reaction.
pub const CREATE_USER_WORKFLOW: &str = "CreateUserWorkflow";

/// Workflow name for the `user_updated` reaction.
pub const USER_UPDATED_WORKFLOW: &str = "UserUpdatedWorkflow";

/// `user_created` as this context reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreatedMessage {
    /// The new user.
    pub user_id: Uuid,
    /// Initial status.
    pub status: ProjectedUserStatus,
    /// Login.
    pub login: String,
    /// Email, if provided.
    #[serde(default)]
    pub email: Option<String>,
    /// Telegram, if provided.
    #[serde(default)]
    pub telegram: Option<String>,
}

/// Updated fields of a `user_updated` delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatedFieldsMessage {
    /// New status, if it changed.
    #[serde(default)]
    pub status: Option<ProjectedUserStatus>,
    /// New email, if it changed.
    #[serde(default)]
    pub email: Option<String>,
    /// New telegram, if it changed.
    #[serde(default)]
    pub telegram: Option<String>,
}

/// Removed fields of a `user_updated` delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemovedFieldsMessage {
    /// Email was cleared.
    #[serde(default)]
    pub email: Option<bool>,
    /// Telegram was cleared.
    #[serde(default)]
    pub telegram: Option<bool>,
}

/// `user_updated` as this context reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdatedMessage {
    /// The updated user.
    pub user_id: Uuid,
    /// Fields that were set.
    #[serde(default)]
    pub updated_fields: Option<UpdatedFieldsMessage>,
    /// Fields that were cleared.
    #[serde(default)]
    pub removed_fields: Option<RemovedFieldsMessage>,
    /// Update instant, epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl UserUpdatedMessage {
    /// Whether the delivery touched any contact channel.
    #[must_use]
    pub fn contact_info_changed(&self) -> bool {
        self.updated_fields
            .as_ref()
            .is_some_and(|u| u.email.is_some() || u.telegram.is_some())
            || self
                .removed_fields
                .as_ref()
                .is_some_and(|r| r.email.is_some() || r.telegram.is_some())
    }

    /// Overlay the delivery's contact diff onto a projected user.
    ///
    /// The projection keeps the contacts it learned at creation time; the
    /// diff carries what changed since, so availability is derived from
    /// the merged view.
    pub fn merge_contacts_into(&self, user: &mut ProjectedUser) {
        if let Some(updated) = &self.updated_fields {
            if let Some(email) = &updated.email {
                user.email = Some(email.clone());
            }
            if let Some(telegram) = &updated.telegram {
                user.telegram = Some(telegram.clone());
            }
        }
        if let Some(removed) = &self.removed_fields {
            if removed.email == Some(true) {
                user.email = None;
            }
            if removed.telegram == Some(true) {
                user.telegram = None;
            }
        }
    }
}

#[derive(Serialize)]
struct FindUserInput {
    user_id: Uuid,
}

#[derive(Serialize)]
struct SetUserStatusInput {
    user_id: Uuid,
    status: ProjectedUserStatus,
}

/// `CreateUserWorkflow`: persist the projection, then welcome the user if
/// they gave an email.
async fn create_user_workflow(
    ctx: WorkflowContext,
    event: UserCreatedMessage,
) -> Result<(), WorkflowError> {
    let user = ProjectedUser {
        user_id: event.user_id,
        status: event.status,
        login: event.login,
        email: event.email.clone(),
        telegram: event.telegram,
    };
    let _user_id: Uuid = ctx.execute("StoreUser", &user).await?;

    let Some(email) = event.email else {
        return Ok(());
    };
    let _notification_id: Uuid = ctx
        .execute(
            "CreateNotification",
            &NotificationPayload {
                email,
                message: "User Created".to_string(),
            },
        )
        .await?;
    Ok(())
}

/// `UserUpdatedWorkflow`: short-circuit unless contact info changed, then
/// derive the desired status from the merged contact view and set it.
/// Tolerates users this context has never projected.
async fn user_updated_workflow(
    ctx: WorkflowContext,
    event: UserUpdatedMessage,
) -> Result<(), WorkflowError> {
    if !event.contact_info_changed() {
        return Ok(());
    }

    let user: Option<ProjectedUser> = ctx
        .execute(
            "FindUser",
            &FindUserInput {
                user_id: event.user_id,
            },
        )
        .await?;
    let Some(mut user) = user else {
        return Ok(());
    };

    event.merge_contacts_into(&mut user);
    let status = if user.has_contact() {
        ProjectedUserStatus::Active
    } else {
        ProjectedUserStatus::Blocked
    };

    let _found: bool = ctx
        .execute(
            "SetUserStatus",
            &SetUserStatusInput {
                user_id: event.user_id,
                status,
            },
        )
        .await?;
    Ok(())
}

/// Register this service's workflows on its worker.
pub fn register(worker: &mut Worker) {
    worker.register_workflow(CREATE_USER_WORKFLOW, create_user_workflow);
    worker.register_workflow(USER_UPDATED_WORKFLOW, user_updated_workflow);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projected() -> ProjectedUser {
        ProjectedUser {
            user_id: Uuid::now_v7(),
            status: ProjectedUserStatus::Active,
            login: "bob".into(),
            email: Some("bob@example.com".into()),
            telegram: None,
        }
    }

    #[test]
    fn status_only_updates_do_not_touch_contact_info() {
        let event = UserUpdatedMessage {
            user_id: Uuid::now_v7(),
            updated_fields: Some(UpdatedFieldsMessage {
                status: Some(ProjectedUserStatus::Blocked),
                ..UpdatedFieldsMessage::default()
            }),
            removed_fields: None,
            updated_at: 0,
        };
        assert!(!event.contact_info_changed());
    }

    #[test]
    fn removing_last_contact_yields_no_channels() {
        let mut user = projected();
        let event = UserUpdatedMessage {
            user_id: user.user_id,
            updated_fields: None,
            removed_fields: Some(RemovedFieldsMessage {
                email: Some(true),
                telegram: None,
            }),
            updated_at: 0,
        };
        assert!(event.contact_info_changed());
        event.merge_contacts_into(&mut user);
        assert!(!user.has_contact());
    }

    #[test]
    fn setting_telegram_keeps_the_user_reachable() {
        let mut user = projected();
        user.email = None;
        let event = UserUpdatedMessage {
            user_id: user.user_id,
            updated_fields: Some(UpdatedFieldsMessage {
                telegram: Some("@bob".into()),
                ..UpdatedFieldsMessage::default()
            }),
            removed_fields: None,
            updated_at: 0,
        };
        event.merge_contacts_into(&mut user);
        assert!(user.has_contact());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = projected();
        let mut twice = projected();
        let event = UserUpdatedMessage {
            user_id: once.user_id,
            updated_fields: Some(UpdatedFieldsMessage {
                email: Some("new@example.com".into()),
                ..UpdatedFieldsMessage::default()
            }),
            removed_fields: Some(RemovedFieldsMessage {
                telegram: Some(true),
                email: None,
            }),
            updated_at: 0,
        };
        event.merge_contacts_into(&mut once);
        event.merge_contacts_into(&mut twice);
        event.merge_contacts_into(&mut twice);
        assert_eq!(once, twice);
    }
}
