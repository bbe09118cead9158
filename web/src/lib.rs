//! HTTP adapter shared by the service APIs.
//!
//! Bridges the domain error taxonomy to transport codes and provides the
//! health endpoints every service binary mounts.

#![forbid(unsafe_code)]

pub mod error;
pub mod health;

pub use error::ApiError;
pub use health::{health_check, readiness_check};
