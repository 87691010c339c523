//! Domain types for the conference core.
//!
//! Conferences, sessions, speakers and attendee profiles, plus the strongly
//! typed identifiers that reference them. Seat and wishlist mutations live on
//! the entities themselves so the invariants are enforced in one place.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Error returned when an identifier string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid identifier: {0}")]
pub struct ParseIdError(String);

/// Unique identifier for a conference
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConferenceId(Uuid);

impl ConferenceId {
    /// Creates a new random `ConferenceId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ConferenceId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConferenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConferenceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

/// Unique identifier for a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random `SessionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SessionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

/// Identifier of a profile: the resolved identity of the requesting user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    /// Create a `ProfileId` from a user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the profile id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a speaker: the normalized form of the speaker's name.
///
/// Two spellings that differ only in case or whitespace address the same
/// speaker.
///
/// ```
/// use conference_core::types::SpeakerId;
///
/// let a = SpeakerId::from_name("Ada Lovelace");
/// let b = SpeakerId::from_name("  ADA   lovelace ");
/// assert_eq!(a, b);
/// assert_eq!(SpeakerId::from_name("   "), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeakerId(String);

impl SpeakerId {
    /// Derive the speaker id from a free-text name.
    ///
    /// Returns `None` when the name is empty after normalization.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = normalize_speaker_name(name);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Wrap an already-normalized key (e.g. loaded from storage).
    #[must_use]
    pub fn from_normalized(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the normalized key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case-fold a speaker name and collapse its whitespace.
#[must_use]
pub fn normalize_speaker_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse whitespace in a speaker name without changing its case.
#[must_use]
pub fn display_speaker_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Identity
// ============================================================================

/// A caller identity resolved by the authentication layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id; doubles as the profile id
    pub user_id: ProfileId,
    /// Nickname used as the initial profile display name
    pub display_name: String,
    /// Email address
    pub email: String,
}

impl Identity {
    /// Create a new identity.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: ProfileId::new(user_id),
            display_name: display_name.into(),
            email: email.into(),
        }
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeOfSession {
    /// No type given
    #[default]
    NotSpecified,
    /// Hands-on workshop
    Workshop,
    /// Lecture
    Lecture,
    /// Keynote
    Keynote,
    /// Information session
    Information,
    /// Networking
    Networking,
}

impl TypeOfSession {
    /// Every session type.
    pub const ALL: [Self; 6] = [
        Self::NotSpecified,
        Self::Workshop,
        Self::Lecture,
        Self::Keynote,
        Self::Information,
        Self::Networking,
    ];

    /// Every session type except `excluded`.
    #[must_use]
    pub fn all_except(excluded: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|t| *t != excluded).collect()
    }

    /// Stable symbol used for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotSpecified => "NOT_SPECIFIED",
            Self::Workshop => "WORKSHOP",
            Self::Lecture => "LECTURE",
            Self::Keynote => "KEYNOTE",
            Self::Information => "INFORMATION",
            Self::Networking => "NETWORKING",
        }
    }
}

impl FromStr for TypeOfSession {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_SPECIFIED" => Ok(Self::NotSpecified),
            "WORKSHOP" => Ok(Self::Workshop),
            "LECTURE" => Ok(Self::Lecture),
            "KEYNOTE" => Ok(Self::Keynote),
            "INFORMATION" => Ok(Self::Information),
            "NETWORKING" => Ok(Self::Networking),
            _ => Err(ParseIdError(s.to_string())),
        }
    }
}

impl fmt::Display for TypeOfSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tee-shirt size stored on a profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types, missing_docs)]
pub enum TeeShirtSize {
    #[default]
    NOT_SPECIFIED,
    XS_M,
    XS_W,
    S_M,
    S_W,
    M_M,
    M_W,
    L_M,
    L_W,
    XL_M,
    XL_W,
    XXL_M,
    XXL_W,
    XXXL_M,
    XXXL_W,
}

impl TeeShirtSize {
    const ALL: [Self; 15] = [
        Self::NOT_SPECIFIED,
        Self::XS_M,
        Self::XS_W,
        Self::S_M,
        Self::S_W,
        Self::M_M,
        Self::M_W,
        Self::L_M,
        Self::L_W,
        Self::XL_M,
        Self::XL_W,
        Self::XXL_M,
        Self::XXL_W,
        Self::XXXL_M,
        Self::XXXL_W,
    ];

    /// Stable symbol used for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NOT_SPECIFIED => "NOT_SPECIFIED",
            Self::XS_M => "XS_M",
            Self::XS_W => "XS_W",
            Self::S_M => "S_M",
            Self::S_W => "S_W",
            Self::M_M => "M_M",
            Self::M_W => "M_W",
            Self::L_M => "L_M",
            Self::L_W => "L_W",
            Self::XL_M => "XL_M",
            Self::XL_W => "XL_W",
            Self::XXL_M => "XXL_M",
            Self::XXL_W => "XXL_W",
            Self::XXXL_M => "XXXL_M",
            Self::XXXL_W => "XXXL_W",
        }
    }
}

impl FromStr for TeeShirtSize {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| ParseIdError(s.to_string()))
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A conference with a fixed capacity and a live seat counter.
///
/// Invariant: `seats_available <= max_attendees`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    /// Conference identifier
    pub id: ConferenceId,
    /// Profile of the organizer
    pub organizer: ProfileId,
    /// Conference name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// City where the conference takes place
    pub city: String,
    /// Topics covered
    pub topics: Vec<String>,
    /// First day
    pub start_date: Option<NaiveDate>,
    /// Last day
    pub end_date: Option<NaiveDate>,
    /// Month of the start date (0 when there is no start date)
    pub month: u32,
    /// Capacity fixed at creation
    pub max_attendees: u32,
    /// Remaining capacity
    pub seats_available: u32,
}

impl Conference {
    /// Take one seat. Returns `false` when the conference is full.
    pub fn take_seat(&mut self) -> bool {
        if self.seats_available == 0 {
            return false;
        }
        self.seats_available -= 1;
        true
    }

    /// Give one seat back, never exceeding the original capacity.
    pub fn release_seat(&mut self) {
        self.seats_available = (self.seats_available + 1).min(self.max_attendees);
    }

    /// Whether the conference has between 1 and `threshold` seats left.
    #[must_use]
    pub const fn is_nearly_sold_out(&self, threshold: u32) -> bool {
        self.seats_available > 0 && self.seats_available <= threshold
    }
}

/// A scheduled talk belonging to exactly one conference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier
    pub id: SessionId,
    /// Owning conference (immutable)
    pub conference_id: ConferenceId,
    /// Session name
    pub name: String,
    /// Highlights
    pub highlights: Vec<String>,
    /// Speakers, in the order they were given
    pub speakers: Vec<SpeakerId>,
    /// Length in minutes
    pub duration_minutes: u32,
    /// Kind of session
    pub type_of_session: TypeOfSession,
    /// Day of the session
    pub date: NaiveDate,
    /// Start time
    pub start_time: NaiveTime,
    /// Room or venue
    pub location: String,
}

impl Session {
    /// Whether the speaker gives this session.
    #[must_use]
    pub fn has_speaker(&self, speaker: &SpeakerId) -> bool {
        self.speakers.contains(speaker)
    }
}

/// A speaker, addressed by normalized name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    /// Normalized name
    pub id: SpeakerId,
    /// Name as first given (whitespace collapsed)
    pub name: String,
}

impl Speaker {
    /// Build a speaker record from a free-text name.
    ///
    /// Returns `None` when the name is blank.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        SpeakerId::from_name(name).map(|id| Self {
            id,
            name: display_speaker_name(name),
        })
    }
}

/// Per-identity attendee profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier (the user id)
    pub id: ProfileId,
    /// Display name
    pub display_name: String,
    /// Main email
    pub main_email: String,
    /// Tee-shirt size
    pub tee_shirt_size: TeeShirtSize,
    /// Conferences the user holds a seat in (set semantics, insertion order)
    pub conferences_to_attend: Vec<ConferenceId>,
    /// Sessions on the wishlist (set semantics, insertion order)
    pub sessions_on_wishlist: Vec<SessionId>,
}

impl Profile {
    /// A fresh profile for a first-time caller.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
            main_email: identity.email.clone(),
            tee_shirt_size: TeeShirtSize::default(),
            conferences_to_attend: Vec::new(),
            sessions_on_wishlist: Vec::new(),
        }
    }

    /// Whether the profile holds a seat in the conference.
    #[must_use]
    pub fn attends(&self, conference: &ConferenceId) -> bool {
        self.conferences_to_attend.contains(conference)
    }

    /// Record attendance. Returns `false` if already attending.
    pub fn add_attendance(&mut self, conference: ConferenceId) -> bool {
        if self.attends(&conference) {
            return false;
        }
        self.conferences_to_attend.push(conference);
        true
    }

    /// Drop attendance. Returns `false` if not attending.
    pub fn remove_attendance(&mut self, conference: &ConferenceId) -> bool {
        let before = self.conferences_to_attend.len();
        self.conferences_to_attend.retain(|c| c != conference);
        self.conferences_to_attend.len() != before
    }

    /// Whether the session is on the wishlist.
    #[must_use]
    pub fn has_wished(&self, session: &SessionId) -> bool {
        self.sessions_on_wishlist.contains(session)
    }

    /// Add to the wishlist. Returns `false` if already present.
    pub fn add_to_wishlist(&mut self, session: SessionId) -> bool {
        if self.has_wished(&session) {
            return false;
        }
        self.sessions_on_wishlist.push(session);
        true
    }

    /// Remove from the wishlist. Returns `false` if absent.
    pub fn remove_from_wishlist(&mut self, session: &SessionId) -> bool {
        let before = self.sessions_on_wishlist.len();
        self.sessions_on_wishlist.retain(|s| s != session);
        self.sessions_on_wishlist.len() != before
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn conference(max: u32, available: u32) -> Conference {
        Conference {
            id: ConferenceId::new(),
            organizer: ProfileId::new("org"),
            name: "RustConf".to_string(),
            description: None,
            city: "Portland".to_string(),
            topics: vec!["Rust".to_string()],
            start_date: None,
            end_date: None,
            month: 0,
            max_attendees: max,
            seats_available: available,
        }
    }

    #[test]
    fn take_seat_stops_at_zero() {
        let mut conf = conference(1, 1);
        assert!(conf.take_seat());
        assert!(!conf.take_seat());
        assert_eq!(conf.seats_available, 0);
    }

    #[test]
    fn release_seat_never_exceeds_capacity() {
        let mut conf = conference(2, 2);
        conf.release_seat();
        assert_eq!(conf.seats_available, 2);
    }

    #[test]
    fn nearly_sold_out_excludes_full_conferences() {
        assert!(!conference(10, 0).is_nearly_sold_out(5));
        assert!(conference(10, 5).is_nearly_sold_out(5));
        assert!(!conference(10, 6).is_nearly_sold_out(5));
    }

    #[test]
    fn speaker_names_normalize() {
        assert_eq!(normalize_speaker_name("  Ada\tLOVELACE \n"), "ada lovelace");
        assert_eq!(display_speaker_name("  Ada   Lovelace "), "Ada Lovelace");
        let speaker = Speaker::from_name(" Grace  Hopper").unwrap();
        assert_eq!(speaker.id.as_str(), "grace hopper");
        assert_eq!(speaker.name, "Grace Hopper");
    }

    #[test]
    fn profile_sets_reject_duplicates() {
        let mut profile = Profile::for_identity(&Identity::new("u1", "Ada", "ada@example.com"));
        let conf = ConferenceId::new();
        assert!(profile.add_attendance(conf));
        assert!(!profile.add_attendance(conf));
        assert!(profile.remove_attendance(&conf));
        assert!(!profile.remove_attendance(&conf));

        let session = SessionId::new();
        assert!(profile.add_to_wishlist(session));
        assert!(!profile.add_to_wishlist(session));
        assert_eq!(profile.sessions_on_wishlist.len(), 1);
    }

    #[test]
    fn enum_symbols_round_trip() {
        assert_eq!("KEYNOTE".parse::<TypeOfSession>(), Ok(TypeOfSession::Keynote));
        assert_eq!("XL_W".parse::<TeeShirtSize>(), Ok(TeeShirtSize::XL_W));
        assert!("keynote".parse::<TypeOfSession>().is_err());
    }

    #[test]
    fn all_except_drops_only_the_excluded_type() {
        let others = TypeOfSession::all_except(TypeOfSession::Workshop);
        assert_eq!(others.len(), TypeOfSession::ALL.len() - 1);
        assert!(!others.contains(&TypeOfSession::Workshop));
        assert!(others.contains(&TypeOfSession::NotSpecified));
    }

    proptest! {
        #[test]
        fn normalization_ignores_case_and_spacing(
            words in prop::collection::vec("[A-Za-z]{1,8}", 1..4),
            gaps in prop::collection::vec("[ \t]{1,3}", 4),
        ) {
            let spaced: String = words
                .iter()
                .zip(&gaps)
                .map(|(word, gap)| format!("{gap}{}", word.to_uppercase()))
                .collect();
            let plain = words.join(" ");

            prop_assert_eq!(SpeakerId::from_name(&spaced), SpeakerId::from_name(&plain));
            let normalized = normalize_speaker_name(&spaced);
            prop_assert_eq!(normalize_speaker_name(&normalized), normalized.clone());
        }
    }
}
