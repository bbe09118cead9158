//! Application layer: notification and user-projection operations.

pub mod notification;
pub mod user;

pub use notification::NotificationAppService;
pub use user::UserProjectionService;
