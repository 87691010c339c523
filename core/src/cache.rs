//! Key-value cache abstraction.
//!
//! The cache holds derived, rebuildable summaries only. Writes are
//! last-writer-wins and nothing relies on reading them back.

use crate::error::CacheError;
use crate::types::ConferenceId;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by cache methods.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// Key of the global "nearly sold out" announcement.
pub const ANNOUNCEMENT_KEY: &str = "RECENT_ANNOUNCEMENTS";

/// Key of a conference's featured speaker summary.
///
/// ```
/// use conference_core::cache::featured_speakers_key;
/// use conference_core::types::ConferenceId;
/// use uuid::Uuid;
///
/// let id = ConferenceId::from_uuid(Uuid::nil());
/// assert_eq!(
///     featured_speakers_key(id),
///     "FEATURED:00000000-0000-0000-0000-000000000000"
/// );
/// ```
#[must_use]
pub fn featured_speakers_key(conference: ConferenceId) -> String {
    format!("FEATURED:{conference}")
}

/// A string-to-string cache.
pub trait Cache: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()>;

    /// Remove a value. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;
}
