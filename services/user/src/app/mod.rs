//! Application layer: user operations over the unit of work.

pub mod service;

pub use service::{NewUser, UserAppService, UserData};
