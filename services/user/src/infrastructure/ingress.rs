//! Event bus ingress.
//!
//! The user service owns these events, so its consumer only logs them; the
//! interesting subscribers live in the payment and notification services.

use serde_json::Value;
use tracing::info;

use emporium_core::bus::EventRouter;

/// Routing table for the user consumer.
#[must_use]
pub fn event_router() -> EventRouter {
    EventRouter::new("user-service")
        .on("user_created", |payload: Value, _ctx| async move {
            info!(%payload, "received user_created event");
            Ok(())
        })
        .on("user_updated", |payload: Value, _ctx| async move {
            info!(%payload, "received user_updated event");
            Ok(())
        })
        .on("user_deleted", |payload: Value, _ctx| async move {
            info!(%payload, "received user_deleted event");
            Ok(())
        })
}
