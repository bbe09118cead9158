//! Health endpoints mounted by every service binary.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Liveness response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Crate version.
    pub version: String,
}

/// Liveness check: 200 whenever the process is running. Does not verify
/// dependencies.
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// Whether the service should receive traffic.
    pub ready: bool,
}

/// Readiness check for orchestrator probes.
pub async fn readiness_check() -> (StatusCode, Json<ReadinessResponse>) {
    (StatusCode::OK, Json(ReadinessResponse { ready: true }))
}
