//! Domain model: notifications and the projected user copy.

pub mod events;
pub mod notification;
pub mod user_projection;

pub use events::{NotificationCreated, NotificationRemoved, NotificationStatusChanged};
pub use notification::{
    Notification, NotificationPayload, NotificationRepository, NotificationStatus, AGGREGATE_TYPE,
};
pub use user_projection::{ProjectedUser, ProjectedUserStatus, UserProjectionRepository};
