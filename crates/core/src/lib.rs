//! Shared primitives for all Rust crates in Wakala.

#![forbid(unsafe_code)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across Wakala crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// The structured variants carry enough detail for callers to produce
/// user-facing messages without re-querying the store. Authentication
/// failures ([`AppError::Unauthorized`]) stay distinct from authorization
/// failures ([`AppError::Forbidden`]) so route guards can tell a missing
/// actor apart from a denied one.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor is not authenticated or the actor record is missing.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Actor is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Commission tier minimum is not strictly below its maximum.
    #[error("tier range invalid: minimum {min} must be below maximum {max}")]
    TierRange {
        /// Proposed range minimum.
        min: Decimal,
        /// Proposed range maximum.
        max: Decimal,
    },

    /// Commission tier range intersects an existing active tier.
    #[error("tier range [{min}, {max}] overlaps active tier {conflicting}")]
    TierOverlap {
        /// Identifier of the active tier already covering part of the range.
        conflicting: Uuid,
        /// Proposed range minimum.
        min: Decimal,
        /// Proposed range maximum.
        max: Decimal,
    },

    /// Attempt to edit or delete a system-managed role.
    #[error("system role '{0}' cannot be modified or deleted")]
    SystemRoleImmutable(String),

    /// Attempt to delete a role that still has active assignments.
    #[error("role '{role}' still has {assignments} active assignment(s)")]
    RoleInUse {
        /// Role name.
        role: String,
        /// Number of active assignments blocking the delete.
        assignments: usize,
    },

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{AppError, NonEmptyString};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn tier_overlap_names_the_conflicting_tier() {
        let conflicting = Uuid::new_v4();
        let error = AppError::TierOverlap {
            conflicting,
            min: Decimal::ZERO,
            max: Decimal::ONE_HUNDRED,
        };
        assert!(error.to_string().contains(&conflicting.to_string()));
    }

    #[test]
    fn role_in_use_reports_assignment_count() {
        let error = AppError::RoleInUse {
            role: "auditor".to_owned(),
            assignments: 3,
        };
        assert!(error.to_string().contains('3'));
    }
}
