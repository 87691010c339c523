//! Conference and session catalog.
//!
//! Creation paths (conferences, sessions, speaker resolution) and the read
//! paths that back the public API. Reads are single-shot: they may be stale
//! but each one is internally consistent.

use crate::metrics::JobMetrics;
use conference_core::cache::{ANNOUNCEMENT_KEY, Cache, featured_speakers_key};
use conference_core::draft::{ConferenceDraft, SessionDraft};
use conference_core::jobs::{Job, JobQueue};
use conference_core::query::{Criterion, compile};
use conference_core::store::{ConferenceStore, Record, WriteSet};
use conference_core::types::{
    Conference, ConferenceId, Identity, Session, SessionId, Speaker, SpeakerId, TypeOfSession,
};
use conference_core::{ConferenceError, EntityKind, Result};
use chrono::NaiveTime;
use std::sync::Arc;

/// Entity creation and read paths.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ConferenceStore>,
    cache: Arc<dyn Cache>,
    jobs: Arc<dyn JobQueue>,
}

impl Catalog {
    /// Create a catalog over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConferenceStore>,
        cache: Arc<dyn Cache>,
        jobs: Arc<dyn JobQueue>,
    ) -> Self {
        Self { store, cache, jobs }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a conference organized by the caller.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::Validation`]: the draft is invalid
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn create_conference(
        &self,
        identity: &Identity,
        draft: ConferenceDraft,
    ) -> Result<Conference> {
        let conference = draft.into_conference(ConferenceId::new(), identity.user_id.clone())?;
        self.store
            .commit(WriteSet::new().insert(Record::Conference(conference.clone())))
            .await?;

        tracing::info!(
            conference = %conference.id,
            organizer = %conference.organizer,
            name = %conference.name,
            "Created conference"
        );
        Ok(conference)
    }

    /// Create a session under a conference the caller organizes.
    ///
    /// Speakers are resolved (created on first mention) before the session is
    /// stored. Once stored, a featured-speaker check is queued for the
    /// conference; a queue failure is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::PermissionDenied`]: the caller is not the organizer
    /// - [`ConferenceError::Validation`]: the draft or a speaker name is invalid
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn create_session(
        &self,
        identity: &Identity,
        conference_id: ConferenceId,
        mut draft: SessionDraft,
    ) -> Result<Session> {
        let conference = self.conference(conference_id).await?;
        if conference.organizer != identity.user_id {
            return Err(ConferenceError::PermissionDenied(
                "Only the owner can add sessions to the conference".to_string(),
            ));
        }

        let speakers = parse_speakers(&std::mem::take(&mut draft.speakers))?;
        let session = draft.into_session(
            SessionId::new(),
            conference_id,
            speakers.iter().map(|speaker| speaker.id.clone()).collect(),
        )?;

        for speaker in speakers {
            self.store.get_or_insert_speaker(speaker).await?;
        }
        self.store
            .commit(WriteSet::new().insert(Record::Session(session.clone())))
            .await?;

        tracing::info!(
            conference = %conference_id,
            session = %session.id,
            speakers = session.speakers.len(),
            "Created session"
        );

        self.enqueue(Job::CheckFeaturedSpeakers { conference_id })
            .await;
        Ok(session)
    }

    /// Resolve free-text speaker names to speaker references.
    ///
    /// Names are normalized; spellings that differ only in case or whitespace
    /// resolve to one speaker, created atomically on first mention.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::Validation`]: a name is blank
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn resolve_speakers(&self, names: &[String]) -> Result<Vec<SpeakerId>> {
        let mut resolved = Vec::new();
        for speaker in parse_speakers(names)? {
            resolved.push(self.store.get_or_insert_speaker(speaker).await?.id);
        }
        Ok(resolved)
    }

    async fn enqueue(&self, job: Job) {
        let name = job.name();
        match self.jobs.enqueue(job).await {
            Ok(()) => JobMetrics::record_enqueued(name),
            Err(error) => {
                JobMetrics::record_enqueue_failure(name);
                tracing::warn!(job = name, error = %error, "Failed to enqueue job");
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Load one conference.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn conference(&self, id: ConferenceId) -> Result<Conference> {
        self.store
            .conference(id)
            .await?
            .map(|stored| stored.into_inner())
            .ok_or_else(|| ConferenceError::not_found(EntityKind::Conference, id))
    }

    /// Conferences organized by the caller, by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the store fails.
    pub async fn conferences_created(&self, identity: &Identity) -> Result<Vec<Conference>> {
        Ok(self
            .store
            .conferences_by_organizer(identity.user_id.clone())
            .await?)
    }

    /// Compile and run a conference query.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::Validation`]: the criteria do not compile
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn query_conferences(&self, criteria: &[Criterion]) -> Result<Vec<Conference>> {
        let plan = compile(criteria)?;
        Ok(self.store.query_conferences(plan).await?)
    }

    /// Conferences the caller holds a seat in, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the store fails.
    pub async fn conferences_to_attend(&self, identity: &Identity) -> Result<Vec<Conference>> {
        let Some(profile) = self.store.profile(identity.user_id.clone()).await? else {
            return Ok(Vec::new());
        };

        let mut conferences = Vec::with_capacity(profile.value.conferences_to_attend.len());
        for id in &profile.value.conferences_to_attend {
            if let Some(stored) = self.store.conference(*id).await? {
                conferences.push(stored.into_inner());
            }
        }
        Ok(conferences)
    }

    /// Sessions on the caller's wishlist, in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the store fails.
    pub async fn wishlist(&self, identity: &Identity) -> Result<Vec<Session>> {
        let Some(profile) = self.store.profile(identity.user_id.clone()).await? else {
            return Ok(Vec::new());
        };

        let mut sessions = Vec::with_capacity(profile.value.sessions_on_wishlist.len());
        for id in &profile.value.sessions_on_wishlist {
            if let Some(stored) = self.store.session(*id).await? {
                sessions.push(stored.into_inner());
            }
        }
        Ok(sessions)
    }

    /// Sessions of a conference.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn conference_sessions(&self, conference: ConferenceId) -> Result<Vec<Session>> {
        self.conference(conference).await?;
        Ok(self.store.sessions_of(conference).await?)
    }

    /// Sessions of a conference with the given type.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn conference_sessions_by_type(
        &self,
        conference: ConferenceId,
        type_of_session: TypeOfSession,
    ) -> Result<Vec<Session>> {
        let mut sessions = self.conference_sessions(conference).await?;
        sessions.retain(|session| session.type_of_session == type_of_session);
        Ok(sessions)
    }

    /// Sessions of any type but `excluded` starting at or before
    /// `latest_start`, across all conferences.
    ///
    /// Two inequalities are not allowed in one query, so the type filter is
    /// rewritten as membership in every other type and the start time stays
    /// the only range.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the store fails.
    pub async fn sessions_not_of_type_before(
        &self,
        excluded: TypeOfSession,
        latest_start: NaiveTime,
    ) -> Result<Vec<Session>> {
        let types = TypeOfSession::all_except(excluded);
        Ok(self
            .store
            .sessions_of_types_starting_by(types, latest_start)
            .await?)
    }

    /// Every session given by a speaker, across all conferences.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: no speaker has that name
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn sessions_by_speaker(&self, name: &str) -> Result<Vec<Session>> {
        let speaker = self.known_speaker(name).await?;
        Ok(self.store.sessions_by_speaker(speaker).await?)
    }

    /// Sessions of one conference given by a speaker.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference or speaker does not exist
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn conference_sessions_by_speaker(
        &self,
        conference: ConferenceId,
        name: &str,
    ) -> Result<Vec<Session>> {
        let speaker = self.known_speaker(name).await?;
        let mut sessions = self.conference_sessions(conference).await?;
        sessions.retain(|session| session.has_speaker(&speaker));
        Ok(sessions)
    }

    /// The published featured-speaker summary of a conference, if any.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Store`] / [`ConferenceError::Cache`]: a backend failed
    pub async fn featured_speakers(&self, conference: ConferenceId) -> Result<Option<String>> {
        self.conference(conference).await?;
        Ok(self.cache.get(&featured_speakers_key(conference)).await?)
    }

    /// The published "nearly sold out" announcement, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Cache`] if the cache fails.
    pub async fn announcement(&self) -> Result<Option<String>> {
        Ok(self.cache.get(ANNOUNCEMENT_KEY).await?)
    }

    async fn known_speaker(&self, name: &str) -> Result<SpeakerId> {
        let not_found = || ConferenceError::not_found(EntityKind::Speaker, name.trim());
        let id = SpeakerId::from_name(name).ok_or_else(not_found)?;
        self.store
            .speaker(id)
            .await?
            .map(|speaker| speaker.id)
            .ok_or_else(not_found)
    }
}

/// Normalize speaker names, dropping repeats and keeping first-mention order.
fn parse_speakers(names: &[String]) -> Result<Vec<Speaker>> {
    let mut speakers: Vec<Speaker> = Vec::with_capacity(names.len());
    for name in names {
        let speaker = Speaker::from_name(name)
            .ok_or_else(|| ConferenceError::validation("Speaker name must not be empty"))?;
        if !speakers.iter().any(|known| known.id == speaker.id) {
            speakers.push(speaker);
        }
    }
    Ok(speakers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn repeated_speakers_collapse_in_mention_order() {
        let names = vec![
            "Grace Hopper".to_string(),
            " ada  LOVELACE".to_string(),
            "Ada Lovelace".to_string(),
        ];
        let speakers = parse_speakers(&names).unwrap();
        let ids: Vec<_> = speakers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["grace hopper", "ada lovelace"]);
        assert_eq!(speakers[1].name, "ada LOVELACE");
    }

    #[test]
    fn blank_speaker_is_rejected() {
        let err = parse_speakers(&["Ada".to_string(), "  ".to_string()]).unwrap_err();
        assert!(matches!(err, ConferenceError::Validation(_)));
    }
}
