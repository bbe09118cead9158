//! # Emporium Core
//!
//! Domain kernel shared by every emporium service.
//!
//! This crate provides the abstractions the bounded contexts are built on:
//!
//! - **[`error::DomainError`]**: the transport-independent error taxonomy.
//!   Domain code returns these; adapters translate them at the boundary.
//! - **[`event::DomainEvent`]** / **[`event::EventEnvelope`]**: domain facts
//!   and the stable JSON envelope they travel in.
//! - **[`bus`]**: the event-bus seam — publishing, typed ingress routing and
//!   the poison-message policy shared by every consumer.
//! - **[`uow::UnitOfWork`]**: named-lock-scoped transactional sessions. Each
//!   service binds it to its own repository provider; the postgres crate
//!   supplies the production implementation.
//! - **[`patch::Patch`]**: the three-way optional (keep / clear / set) used
//!   by field-level updates.
//!
//! ## Architecture principles
//!
//! - Domain state machines are pure: load, validate, mutate, return the event.
//! - Store first, then publish — both inside the same unit of work.
//! - Events are facts, never commands.
//! - No process-global state; dependencies are injected through traits.

#![forbid(unsafe_code)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod patch;
pub mod uow;

pub use bus::{Delivery, DeliveryContext, Disposition, EventBus, EventBusError, EventRouter};
pub use clock::{Clock, SystemClock};
pub use error::DomainError;
pub use event::{DomainEvent, EventDispatcher, EventEnvelope, CONTENT_TYPE_JSON};
pub use patch::Patch;
pub use uow::UnitOfWork;
