//! Domain error to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use emporium_core::error::DomainError;

/// Error type returned by every API handler.
///
/// Wraps a [`DomainError`] and renders it as `{code, message}` with the
/// mapped status. Warn-level kinds (not found, invalid argument, conflicts,
/// cancellation) log at WARN, everything else at ERROR.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

/// JSON body of an error response.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn status_and_code(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::AlreadyExists { .. } => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
        DomainError::InvalidStateTransition { .. } => {
            (StatusCode::PRECONDITION_FAILED, "FAILED_PRECONDITION")
        }
        DomainError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        DomainError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        DomainError::PermissionDenied => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
        DomainError::InsufficientStock { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_STOCK"),
        DomainError::InsufficientFunds { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_FUNDS"),
        DomainError::Cancelled => (StatusCode::BAD_REQUEST, "CANCELLED"),
        DomainError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
        DomainError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = status_and_code(&self.0);
        if self.0.is_warn() {
            warn!(code, error = %self.0, "request failed");
        } else {
            error!(code, error = %self.0, "request failed");
        }
        let body = ErrorBody {
            code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (DomainError::not_found("order", Uuid::nil()), StatusCode::NOT_FOUND),
            (
                DomainError::AlreadyExists {
                    entity: "user",
                    field: "login",
                    value: "u".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::InvalidStateTransition {
                    entity: "order",
                    from: "Open".into(),
                    to: "Paid".into(),
                },
                StatusCode::PRECONDITION_FAILED,
            ),
            (DomainError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(status_and_code(&err).0, status);
        }
    }
}
