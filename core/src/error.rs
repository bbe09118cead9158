//! Domain error taxonomy.
//!
//! Domain errors are values with a kind discriminant, independent of any
//! transport. They propagate unchanged through the application layer; the
//! HTTP adapter maps them to response codes and the workflow adapter wraps
//! them into activity failures.

use thiserror::Error;
use uuid::Uuid;

/// The error taxonomy shared by every bounded context.
///
/// Variants mirror the transport-independent kinds: adapters translate them
/// at the boundary (`NotFound` → 404 / NOT_FOUND, `InvalidStateTransition` →
/// failed precondition, and so on).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The aggregate does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Aggregate kind, e.g. `"user"`.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A uniqueness constraint (login, email, telegram, …) is already taken.
    #[error("{entity} with {field} {value:?} already exists")]
    AlreadyExists {
        /// Aggregate kind.
        entity: &'static str,
        /// The unique field.
        field: &'static str,
        /// The conflicting value.
        value: String,
    },

    /// The state machine rejected the transition.
    #[error("invalid {entity} state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Aggregate kind.
        entity: &'static str,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller is not authenticated.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is authenticated but not allowed.
    #[error("permission denied")]
    PermissionDenied,

    /// A stock reservation asked for more units than are available.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock {
        /// The product whose stock ran out.
        product_id: Uuid,
    },

    /// A wallet charge would drive the balance negative.
    #[error("insufficient funds in wallet {wallet_id}")]
    InsufficientFunds {
        /// The wallet being charged.
        wallet_id: Uuid,
    },

    /// Infrastructure failure (database, broker, serialization, …).
    #[error("internal error: {0}")]
    Internal(String),

    /// The ambient context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline expired.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl DomainError {
    /// Wrap an infrastructure failure.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Shorthand for a [`DomainError::NotFound`] keyed by a UUID.
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error is expected caller behaviour and logged at WARN
    /// rather than ERROR.
    #[must_use]
    pub const fn is_warn(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidStateTransition { .. }
                | Self::InvalidArgument(_)
                | Self::Unauthorized
                | Self::PermissionDenied
                | Self::InsufficientStock { .. }
                | Self::InsufficientFunds { .. }
                | Self::Cancelled
                | Self::DeadlineExceeded
        )
    }

    /// Whether this is a [`DomainError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_level_classification() {
        assert!(DomainError::not_found("user", Uuid::nil()).is_warn());
        assert!(DomainError::InvalidArgument("bad".into()).is_warn());
        assert!(DomainError::Cancelled.is_warn());
        assert!(!DomainError::Internal("boom".into()).is_warn());
    }

    #[test]
    fn display_includes_identifiers() {
        let err = DomainError::AlreadyExists {
            entity: "user",
            field: "login",
            value: "bob".into(),
        };
        assert_eq!(err.to_string(), "user with login \"bob\" already exists");
    }
}
