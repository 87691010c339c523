//! Error taxonomy for the conference core.
//!
//! [`ConferenceError`] is what callers of the core see. The collaborator
//! errors ([`StoreError`], [`CacheError`], [`QueueError`]) are what the store,
//! cache and job-queue backends report.

use std::fmt;
use thiserror::Error;

/// Why a request conflicts with current state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The profile already holds a seat in the conference.
    #[error("already registered")]
    AlreadyRegistered,

    /// The conference has no seats left.
    #[error("no seats available")]
    NoSeatsAvailable,

    /// The session is already on the wishlist.
    #[error("already on wishlist")]
    AlreadyOnWishlist,

    /// Concurrent writers kept invalidating the transaction until the retry
    /// budget ran out.
    #[error("contention, try again")]
    Contention,
}

/// Kind of entity named in a not-found error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A conference
    Conference,
    /// A session
    Session,
    /// A speaker
    Speaker,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Conference => "conference",
            Self::Session => "session",
            Self::Speaker => "speaker",
        })
    }
}

/// Errors reported by a [`ConferenceStore`](crate::store::ConferenceStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: a record in the write set was
    /// modified (or created) since it was read.
    #[error("Write conflict on {key}")]
    WriteConflict {
        /// The record whose version did not match.
        key: String,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors reported by a [`Cache`](crate::cache::Cache).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache backend failed.
    #[error("Cache error: {0}")]
    Backend(String),
}

/// Errors reported by a [`JobQueue`](crate::jobs::JobQueue) or
/// [`JobSource`](crate::jobs::JobSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue backend failed.
    #[error("Queue error: {0}")]
    Backend(String),

    /// A job payload could not be encoded or decoded.
    #[error("Job serialization error: {0}")]
    Serialization(String),

    /// The queue no longer accepts jobs.
    #[error("Job queue is closed")]
    Closed,
}

/// Errors surfaced by conference core operations.
#[derive(Error, Debug)]
pub enum ConferenceError {
    /// Malformed input: unknown filter field or operator, two inequality
    /// fields, non-numeric value, missing name, unparsable date.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("No {kind} found with key: {key}")]
    NotFound {
        /// What was looked up
        kind: EntityKind,
        /// The key that was not found
        key: String,
    },

    /// The request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// The caller may not perform this operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl ConferenceError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a not-found error.
    pub fn not_found(kind: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Whether this error is an optimistic-concurrency conflict worth retrying.
    #[must_use]
    pub const fn is_write_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::WriteConflict { .. }))
    }

    /// The conflict reason, if this is a conflict.
    #[must_use]
    pub const fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            Self::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Convenience alias used across the core.
pub type Result<T> = std::result::Result<T, ConferenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_match_reasons() {
        let error = ConferenceError::Conflict(ConflictReason::NoSeatsAvailable);
        assert_eq!(error.to_string(), "Conflict: no seats available");
        assert_eq!(
            ConflictReason::Contention.to_string(),
            "contention, try again"
        );
    }

    #[test]
    fn only_write_conflicts_are_retryable() {
        let conflict = ConferenceError::from(StoreError::WriteConflict {
            key: "conference:1".to_string(),
        });
        assert!(conflict.is_write_conflict());
        assert!(!ConferenceError::from(StoreError::Database("down".into())).is_write_conflict());
        assert!(!ConferenceError::Conflict(ConflictReason::AlreadyRegistered).is_write_conflict());
    }

    #[test]
    fn not_found_names_entity_and_key() {
        let error = ConferenceError::not_found(EntityKind::Session, "abc");
        assert_eq!(error.to_string(), "No session found with key: abc");
    }
}
