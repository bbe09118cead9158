//! Projected copy of users owned by the user service.
//!
//! Carried as identifiers and contact details only; reconciled from
//! `user_created` / `user_updated` deliveries, never shared transactions.

use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use emporium_core::error::DomainError;

/// Status of a projected user, mirroring the owning service's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedUserStatus {
    /// No usable contact information.
    Blocked,
    /// Normal state.
    Active,
    /// Deleted upstream.
    Deleted,
}

impl ProjectedUserStatus {
    /// Wire code of the status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Blocked => 0,
            Self::Active => 1,
            Self::Deleted => 2,
        }
    }

    /// Parse a wire code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Blocked),
            1 => Some(Self::Active),
            2 => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl Serialize for ProjectedUserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ProjectedUserStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown user status code {code}")))
    }
}

/// One projected user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedUser {
    /// Upstream identity.
    pub user_id: Uuid,
    /// Projected status.
    pub status: ProjectedUserStatus,
    /// Login at projection time.
    pub login: String,
    /// Email, if the user has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Telegram, if the user has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

impl ProjectedUser {
    /// Whether the user can be reached on any channel.
    #[must_use]
    pub const fn has_contact(&self) -> bool {
        self.email.is_some() || self.telegram.is_some()
    }
}

/// Repository contract for the user projection.
#[async_trait]
pub trait UserProjectionRepository: Send {
    /// Upsert a projected user.
    async fn store_user(&mut self, user: &ProjectedUser) -> Result<(), DomainError>;

    /// Load a projected user, if present.
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<ProjectedUser>, DomainError>;
}
