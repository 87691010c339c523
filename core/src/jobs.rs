//! Background jobs and the queue that carries them.
//!
//! Delivery is at-least-once with no ordering guarantee, so every job handler
//! must be idempotent.

use crate::error::QueueError;
use crate::types::ConferenceId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by queue methods.
pub type QueueFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>;

/// A unit of deferred work.
///
/// Serialized as internally tagged JSON:
///
/// ```
/// use conference_core::jobs::Job;
///
/// let json = Job::RefreshAnnouncement.to_json().unwrap();
/// assert_eq!(json, r#"{"kind":"refresh_announcement"}"#);
/// assert_eq!(Job::from_json(&json).unwrap(), Job::RefreshAnnouncement);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Recompute the featured speaker summary of one conference.
    CheckFeaturedSpeakers {
        /// Conference to inspect
        conference_id: ConferenceId,
    },
    /// Recompute the "nearly sold out" announcement.
    RefreshAnnouncement,
}

impl Job {
    /// Short name used in logs and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CheckFeaturedSpeakers { .. } => "check_featured_speakers",
            Self::RefreshAnnouncement => "refresh_announcement",
        }
    }

    /// Encode for a durable queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Decode a payload read from a durable queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Serialization`] if the payload is not a job.
    pub fn from_json(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

/// Producer side of the job runner.
pub trait JobQueue: Send + Sync {
    /// Schedule a job for asynchronous execution.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the job could not be handed to the queue.
    fn enqueue(&self, job: Job) -> QueueFuture<'_, ()>;
}

/// Consumer side of the job runner, owned by a single worker.
pub trait JobSource: Send {
    /// Wait for the next job. `Ok(None)` means the source is exhausted.
    ///
    /// Calling this again marks the previously returned job as done. The
    /// returned future may be dropped before it completes; a job taken from
    /// the backend by a dropped call must still be delivered later.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] if the backend fails or a payload is malformed.
    fn next_job(&mut self) -> QueueFuture<'_, Option<Job>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn featured_job_carries_conference_id() {
        let id = ConferenceId::new();
        let job = Job::CheckFeaturedSpeakers { conference_id: id };
        let json = job.to_json().unwrap();
        assert!(json.contains(r#""kind":"check_featured_speakers""#));
        assert!(json.contains(&id.to_string()));
        assert_eq!(Job::from_json(&json).unwrap(), job);
    }

    #[test]
    fn malformed_payload_is_a_serialization_error() {
        let err = Job::from_json(r#"{"kind":"reindex"}"#).unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }
}
