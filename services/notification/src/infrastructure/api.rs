//! HTTP API for the notification service. Ping-grade.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use emporium_web::{health_check, readiness_check};

#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}

/// Build the notification API router.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}
