//! Domain model: the user aggregate and its events.

pub mod events;
pub mod user;

pub use events::{RemovedFields, UpdatedFields, UserCreated, UserDeleted, UserUpdated};
pub use user::{User, UserRepository, UserStatus, UserUpdate, AGGREGATE_TYPE};
