//! In-memory [`ConferenceStore`].

use conference_core::error::StoreError;
use conference_core::query::QueryPlan;
use conference_core::store::{ConferenceStore, Record, RecordKey, StoreFuture, WriteSet};
use conference_core::types::{
    Conference, ConferenceId, Profile, ProfileId, Session, SessionId, Speaker, SpeakerId,
    TypeOfSession,
};
use conference_core::version::{Version, Versioned};
use chrono::NaiveTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Tables {
    conferences: HashMap<ConferenceId, Versioned<Conference>>,
    sessions: HashMap<SessionId, Versioned<Session>>,
    profiles: HashMap<ProfileId, Versioned<Profile>>,
    speakers: BTreeMap<SpeakerId, Speaker>,
}

impl Tables {
    fn version_of(&self, key: &RecordKey) -> Option<Version> {
        match key {
            RecordKey::Conference(id) => self.conferences.get(id).map(|r| r.version),
            RecordKey::Profile(id) => self.profiles.get(id).map(|r| r.version),
            RecordKey::Session(id) => self.sessions.get(id).map(|r| r.version),
        }
    }

    fn put(&mut self, record: Record, version: Version) {
        match record {
            Record::Conference(c) => {
                self.conferences.insert(c.id, Versioned::new(c, version));
            }
            Record::Profile(p) => {
                self.profiles.insert(p.id.clone(), Versioned::new(p, version));
            }
            Record::Session(s) => {
                self.sessions.insert(s.id, Versioned::new(s, version));
            }
        }
    }

    fn conferences_where(&self, keep: impl Fn(&Conference) -> bool) -> Vec<Conference> {
        let mut conferences: Vec<Conference> = self
            .conferences
            .values()
            .map(|r| &r.value)
            .filter(|c| keep(c))
            .cloned()
            .collect();
        conferences.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        conferences
    }

    fn sessions_where(&self, keep: impl Fn(&Session) -> bool) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .map(|r| &r.value)
            .filter(|s| keep(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        sessions
    }
}

/// In-memory store for fast, deterministic tests.
///
/// Commits are checked and applied under one write lock, so they are atomic
/// with respect to each other exactly like a transactional backend. No method
/// ever yields: on a current-thread runtime, concurrently spawned operations
/// interleave only at their own await points.
///
/// Write conflicts can be injected with [`fail_next_commits`](Self::fail_next_commits).
///
/// # Example
///
/// ```
/// use conference_testing::InMemoryStore;
/// use conference_core::store::{ConferenceStore, Record, WriteSet};
/// use conference_testing::fixtures;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let conference = fixtures::conference("RustConf", 10);
/// store.commit(WriteSet::new().insert(Record::Conference(conference.clone()))).await?;
///
/// assert_eq!(store.seats_available(conference.id), Some(10));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    injected_conflicts: Arc<AtomicU32>,
    commits: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a write conflict.
    pub fn fail_next_commits(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of commits applied successfully.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Current seat count of a conference.
    #[must_use]
    pub fn seats_available(&self, id: ConferenceId) -> Option<u32> {
        self.tables
            .read()
            .unwrap()
            .conferences
            .get(&id)
            .map(|r| r.value.seats_available)
    }

    /// Stored profile, without going through the async API.
    #[must_use]
    pub fn stored_profile(&self, id: &ProfileId) -> Option<Profile> {
        self.tables
            .read()
            .unwrap()
            .profiles
            .get(id)
            .map(|r| r.value.clone())
    }

    /// Number of speaker records.
    #[must_use]
    pub fn speaker_count(&self) -> usize {
        self.tables.read().unwrap().speakers.len()
    }

    /// Remove a session, simulating an edit made outside the core.
    pub fn remove_session(&self, id: SessionId) {
        self.tables.write().unwrap().sessions.remove(&id);
    }
}

impl ConferenceStore for InMemoryStore {
    fn conference(&self, id: ConferenceId) -> StoreFuture<'_, Option<Versioned<Conference>>> {
        Box::pin(async move { Ok(self.tables.read().unwrap().conferences.get(&id).cloned()) })
    }

    fn conferences(&self) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move { Ok(self.tables.read().unwrap().conferences_where(|_| true)) })
    }

    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .unwrap()
                .conferences_where(|c| c.organizer == organizer))
        })
    }

    fn query_conferences(&self, plan: QueryPlan) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let mut conferences = self
                .tables
                .read()
                .unwrap()
                .conferences_where(|c| plan.matches(c));
            conferences.sort_by(|a, b| plan.compare(a, b));
            Ok(conferences)
        })
    }

    fn session(&self, id: SessionId) -> StoreFuture<'_, Option<Versioned<Session>>> {
        Box::pin(async move { Ok(self.tables.read().unwrap().sessions.get(&id).cloned()) })
    }

    fn sessions_of(&self, conference: ConferenceId) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .unwrap()
                .sessions_where(|s| s.conference_id == conference))
        })
    }

    fn sessions_by_speaker(&self, speaker: SpeakerId) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .unwrap()
                .sessions_where(|s| s.has_speaker(&speaker)))
        })
    }

    fn sessions_of_types_starting_by(
        &self,
        types: Vec<TypeOfSession>,
        latest_start: NaiveTime,
    ) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            Ok(self.tables.read().unwrap().sessions_where(|s| {
                types.contains(&s.type_of_session) && s.start_time <= latest_start
            }))
        })
    }

    fn profile(&self, id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>> {
        Box::pin(async move { Ok(self.tables.read().unwrap().profiles.get(&id).cloned()) })
    }

    fn speaker(&self, id: SpeakerId) -> StoreFuture<'_, Option<Speaker>> {
        Box::pin(async move { Ok(self.tables.read().unwrap().speakers.get(&id).cloned()) })
    }

    fn speakers(&self, mut ids: Vec<SpeakerId>) -> StoreFuture<'_, Vec<Speaker>> {
        Box::pin(async move {
            ids.sort();
            ids.dedup();
            let tables = self.tables.read().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| tables.speakers.get(id).cloned())
                .collect())
        })
    }

    fn get_or_insert_speaker(&self, speaker: Speaker) -> StoreFuture<'_, Speaker> {
        Box::pin(async move {
            Ok(self
                .tables
                .write()
                .unwrap()
                .speakers
                .entry(speaker.id.clone())
                .or_insert(speaker)
                .clone())
        })
    }

    fn commit(&self, writes: WriteSet) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let first_key = || {
                writes
                    .iter()
                    .next()
                    .map(|w| w.record.key().to_string())
                    .unwrap_or_default()
            };

            if self
                .injected_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::WriteConflict { key: first_key() });
            }

            let mut tables = self.tables.write().unwrap();
            if let Some(stale) = writes
                .iter()
                .find(|w| !w.expected.is_satisfied_by(tables.version_of(&w.record.key())))
            {
                return Err(StoreError::WriteConflict {
                    key: stale.record.key().to_string(),
                });
            }

            for write in writes {
                let version = write.expected.next();
                tables.put(write.record, version);
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
