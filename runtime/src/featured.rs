//! Speaker aggregator.
//!
//! A speaker who gives at least two sessions of a conference is "featured".
//! The aggregator recomputes the featured list of one conference from scratch
//! and publishes it to the cache, or clears the entry when nobody qualifies.
//! Each run overwrites the previous result, so duplicate or reordered
//! deliveries of the same job are harmless.

use conference_core::Result;
use conference_core::cache::{Cache, featured_speakers_key};
use conference_core::store::ConferenceStore;
use conference_core::types::{ConferenceId, Session, SessionId, Speaker, SpeakerId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

/// Minimum number of sessions that makes a speaker featured.
pub const FEATURED_SESSION_COUNT: usize = 2;

/// A speaker with the sessions they give in one conference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeaturedSpeaker {
    /// Normalized speaker name
    pub id: SpeakerId,
    /// Display name
    pub name: String,
    /// Session names, ordered by name then session id
    pub sessions: Vec<String>,
}

/// Pick the featured speakers out of a conference's sessions.
///
/// `speakers` supplies display names; a speaker missing from it is shown by
/// normalized name. The result is ordered by display name, then id.
#[must_use]
pub fn featured_speakers(sessions: &[Session], speakers: &[Speaker]) -> Vec<FeaturedSpeaker> {
    let mut by_speaker: BTreeMap<&SpeakerId, BTreeSet<(&str, SessionId)>> = BTreeMap::new();
    for session in sessions {
        for speaker in &session.speakers {
            by_speaker
                .entry(speaker)
                .or_default()
                .insert((session.name.as_str(), session.id));
        }
    }

    let mut featured: Vec<FeaturedSpeaker> = by_speaker
        .into_iter()
        .filter(|(_, sessions)| sessions.len() >= FEATURED_SESSION_COUNT)
        .map(|(id, sessions)| FeaturedSpeaker {
            id: id.clone(),
            name: speakers
                .iter()
                .find(|speaker| &speaker.id == id)
                .map_or_else(|| id.to_string(), |speaker| speaker.name.clone()),
            sessions: sessions.into_iter().map(|(name, _)| name.to_string()).collect(),
        })
        .collect();

    featured.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    featured
}

/// Render the cached summary.
///
/// ```
/// use conference_runtime::featured::{FeaturedSpeaker, render_summary};
/// use conference_core::types::SpeakerId;
///
/// let ada = FeaturedSpeaker {
///     id: SpeakerId::from_normalized("ada lovelace"),
///     name: "Ada Lovelace".to_string(),
///     sessions: vec!["Engines".to_string(), "Notes".to_string()],
/// };
/// assert_eq!(
///     render_summary(&[ada]),
///     "Featured speakers: Ada Lovelace (Engines, Notes)"
/// );
/// ```
#[must_use]
pub fn render_summary(featured: &[FeaturedSpeaker]) -> String {
    let mut summary = String::from("Featured speakers: ");
    for (i, speaker) in featured.iter().enumerate() {
        if i > 0 {
            summary.push_str("; ");
        }
        let _ = write!(summary, "{} ({})", speaker.name, speaker.sessions.join(", "));
    }
    summary
}

/// Publishes per-conference featured-speaker summaries.
#[derive(Clone)]
pub struct SpeakerAggregator {
    store: Arc<dyn ConferenceStore>,
    cache: Arc<dyn Cache>,
}

impl SpeakerAggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new(store: Arc<dyn ConferenceStore>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Recompute and publish the summary for one conference.
    ///
    /// Returns the published summary, or `None` when the entry was cleared.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] or [`ConferenceError::Cache`] if a
    /// backend fails.
    ///
    /// [`ConferenceError::Store`]: conference_core::ConferenceError::Store
    /// [`ConferenceError::Cache`]: conference_core::ConferenceError::Cache
    pub async fn run(&self, conference: ConferenceId) -> Result<Option<String>> {
        let sessions = self.store.sessions_of(conference).await?;

        let referenced: BTreeSet<SpeakerId> = sessions
            .iter()
            .flat_map(|session| session.speakers.iter().cloned())
            .collect();
        let speakers = self.store.speakers(referenced.into_iter().collect()).await?;

        let featured = featured_speakers(&sessions, &speakers);
        let key = featured_speakers_key(conference);

        if featured.is_empty() {
            self.cache.delete(&key).await?;
            tracing::debug!(conference = %conference, "No featured speakers");
            return Ok(None);
        }

        let summary = render_summary(&featured);
        self.cache.set(&key, summary.clone()).await?;
        tracing::info!(
            conference = %conference,
            featured = featured.len(),
            "Published featured speakers"
        );
        Ok(Some(summary))
    }
}
