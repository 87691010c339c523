//! Persistent store abstraction.
//!
//! [`ConferenceStore`] is the only way the core touches durable state. Reads
//! return records together with their [`Version`](crate::version::Version);
//! writes go through [`ConferenceStore::commit`], which applies a whole
//! [`WriteSet`] atomically or not at all.
//!
//! # Implementations
//!
//! - `PostgresStore` (in `conference-postgres`): production implementation
//! - `InMemoryStore` (in `conference-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return [`StoreFuture`] (a pinned, boxed `Send` future) instead of
//! using `async fn`, so the store can be shared as `Arc<dyn ConferenceStore>`.

use crate::error::StoreError;
use crate::query::QueryPlan;
use crate::types::{
    Conference, ConferenceId, Profile, ProfileId, Session, SessionId, Speaker, SpeakerId,
    TypeOfSession,
};
use crate::version::{ExpectedVersion, Version, Versioned};
use chrono::NaiveTime;
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Key of a versioned record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// A conference
    Conference(ConferenceId),
    /// A profile
    Profile(ProfileId),
    /// A session
    Session(SessionId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conference(id) => write!(f, "conference:{id}"),
            Self::Profile(id) => write!(f, "profile:{id}"),
            Self::Session(id) => write!(f, "session:{id}"),
        }
    }
}

/// A record to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    /// A conference
    Conference(Conference),
    /// A profile
    Profile(Profile),
    /// A session
    Session(Session),
}

impl Record {
    /// The key the record is stored under.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Conference(c) => RecordKey::Conference(c.id),
            Self::Profile(p) => RecordKey::Profile(p.id.clone()),
            Self::Session(s) => RecordKey::Session(s.id),
        }
    }
}

/// One write in a [`WriteSet`]: the new record and what it replaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    /// New contents
    pub record: Record,
    /// Version the record must currently have
    pub expected: ExpectedVersion,
}

/// Writes committed together as one atomic unit.
///
/// Ledger operations touch one or two records, so the set is stored inline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSet {
    writes: SmallVec<[Write; 2]>,
}

impl WriteSet {
    /// An empty write set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write with an explicit expectation.
    #[must_use]
    pub fn write(mut self, record: Record, expected: ExpectedVersion) -> Self {
        self.writes.push(Write { record, expected });
        self
    }

    /// Insert a record that must not exist yet.
    #[must_use]
    pub fn insert(self, record: Record) -> Self {
        self.write(record, ExpectedVersion::Absent)
    }

    /// Replace a record read at `version`.
    #[must_use]
    pub fn update(self, record: Record, version: Version) -> Self {
        self.write(record, ExpectedVersion::Exact(version))
    }

    /// Number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the set holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterate over the writes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Write> {
        self.writes.iter()
    }
}

impl IntoIterator for WriteSet {
    type Item = Write;
    type IntoIter = smallvec::IntoIter<[Write; 2]>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Durable storage for conferences, sessions, speakers and profiles.
///
/// Lists are returned in a deterministic order: conferences by name then id,
/// sessions by name then id, speakers by id.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every
/// request handler and background job.
pub trait ConferenceStore: Send + Sync {
    /// Load a conference with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn conference(&self, id: ConferenceId) -> StoreFuture<'_, Option<Versioned<Conference>>>;

    /// Load every conference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn conferences(&self) -> StoreFuture<'_, Vec<Conference>>;

    /// Load the conferences a profile organizes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>>;

    /// Execute a compiled query, honouring the plan's sort order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn query_conferences(&self, plan: QueryPlan) -> StoreFuture<'_, Vec<Conference>>;

    /// Load a session with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn session(&self, id: SessionId) -> StoreFuture<'_, Option<Versioned<Session>>>;

    /// Load the sessions belonging to a conference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn sessions_of(&self, conference: ConferenceId) -> StoreFuture<'_, Vec<Session>>;

    /// Load every session naming the speaker, across all conferences.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn sessions_by_speaker(&self, speaker: SpeakerId) -> StoreFuture<'_, Vec<Session>>;

    /// Load every session whose type is one of `types` and which starts at
    /// or before `latest_start`, across all conferences, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn sessions_of_types_starting_by(
        &self,
        types: Vec<TypeOfSession>,
        latest_start: NaiveTime,
    ) -> StoreFuture<'_, Vec<Session>>;

    /// Load a profile with its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn profile(&self, id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>>;

    /// Load a speaker by normalized name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn speaker(&self, id: SpeakerId) -> StoreFuture<'_, Option<Speaker>>;

    /// Load the given speakers. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn speakers(&self, ids: Vec<SpeakerId>) -> StoreFuture<'_, Vec<Speaker>>;

    /// Atomically insert the speaker unless one with the same id exists.
    ///
    /// Returns the stored speaker: the argument if it was inserted, the
    /// existing record otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    fn get_or_insert_speaker(&self, speaker: Speaker) -> StoreFuture<'_, Speaker>;

    /// Apply every write or none of them.
    ///
    /// Each written record gets version `expected.next()`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::WriteConflict`]: some record's current version does not
    ///   match its expectation; nothing was written
    /// - [`StoreError::Database`]: the backend failed
    fn commit(&self, writes: WriteSet) -> StoreFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_set_records_expectations() {
        let profile = Profile {
            id: ProfileId::new("u1"),
            display_name: "Ada".into(),
            main_email: "ada@example.com".into(),
            tee_shirt_size: crate::types::TeeShirtSize::default(),
            conferences_to_attend: Vec::new(),
            sessions_on_wishlist: Vec::new(),
        };
        let writes = WriteSet::new()
            .insert(Record::Profile(profile.clone()))
            .update(Record::Profile(profile), Version::new(4));

        let expected: Vec<_> = writes.iter().map(|w| w.expected).collect();
        assert_eq!(
            expected,
            [
                ExpectedVersion::Absent,
                ExpectedVersion::Exact(Version::new(4))
            ]
        );
        assert_eq!(writes.len(), 2);
        assert_eq!(
            writes.iter().next().map(|w| w.record.key().to_string()),
            Some("profile:u1".to_string())
        );
    }
}
