//! Caller-supplied forms for new conferences and sessions.
//!
//! Drafts carry loosely-typed input (dates and times as text, every field
//! optional). Converting a draft into an entity validates it and fills in the
//! documented defaults.

use crate::error::{ConferenceError, Result};
use crate::types::{
    Conference, ConferenceId, ProfileId, Session, SessionId, SpeakerId, TypeOfSession,
};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const DEFAULT_CITY: &str = "Default City";
const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];
const DEFAULT_HIGHLIGHTS: [&str; 2] = ["Default", "Highlight"];
const DEFAULT_LOCATION: &str = "Default Location";
const DEFAULT_SESSION_DATE: &str = "1900-01-01";
const DEFAULT_START_TIME: &str = "10:00";
const DEFAULT_DURATION: &str = "00:00";

/// Input for creating a conference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceDraft {
    /// Required
    pub name: Option<String>,
    /// Free text
    pub description: Option<String>,
    /// Defaults to `Default City`
    pub city: Option<String>,
    /// Defaults to `[Default, Topic]`
    pub topics: Option<Vec<String>>,
    /// `YYYY-MM-DD`; only the first 10 characters are read
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`; only the first 10 characters are read
    pub end_date: Option<String>,
    /// Defaults to 0
    pub max_attendees: Option<u32>,
}

impl ConferenceDraft {
    /// A draft with only the name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Validate the draft and build the conference.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Validation`] when the name is missing or a
    /// date does not parse.
    pub fn into_conference(self, id: ConferenceId, organizer: ProfileId) -> Result<Conference> {
        let name = required_name(self.name, "Conference")?;
        let start_date = self.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = self.end_date.as_deref().map(parse_date).transpose()?;
        let max_attendees = self.max_attendees.unwrap_or(0);

        Ok(Conference {
            id,
            organizer,
            name,
            description: self.description,
            city: self
                .city
                .filter(|city| !city.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CITY.to_string()),
            topics: non_empty_or(self.topics, &DEFAULT_TOPICS),
            month: start_date.map_or(0, |date| date.month()),
            start_date,
            end_date,
            max_attendees,
            seats_available: max_attendees,
        })
    }
}

/// Input for creating a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    /// Required
    pub name: Option<String>,
    /// Defaults to `[Default, Highlight]`
    pub highlights: Option<Vec<String>>,
    /// Free-text speaker names, resolved to speakers on creation
    pub speakers: Vec<String>,
    /// `HH:MM`; defaults to `00:00`
    pub duration: Option<String>,
    /// Defaults to `NOT_SPECIFIED`
    pub type_of_session: Option<TypeOfSession>,
    /// `YYYY-MM-DD`; defaults to `1900-01-01`
    pub date: Option<String>,
    /// `HH:MM`; defaults to `10:00`
    pub start_time: Option<String>,
    /// Defaults to `Default Location`
    pub location: Option<String>,
}

impl SessionDraft {
    /// A draft with a name and speakers.
    pub fn named<S: Into<String>>(
        name: impl Into<String>,
        speakers: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            speakers: speakers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Validate the draft and build the session.
    ///
    /// `speakers` are the already resolved references for `self.speakers`.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Validation`] when the name is missing or a
    /// date or time does not parse.
    pub fn into_session(
        self,
        id: SessionId,
        conference_id: ConferenceId,
        speakers: Vec<SpeakerId>,
    ) -> Result<Session> {
        let name = required_name(self.name, "Session")?;
        let duration = parse_time(self.duration.as_deref().unwrap_or(DEFAULT_DURATION))?;

        Ok(Session {
            id,
            conference_id,
            name,
            highlights: non_empty_or(self.highlights, &DEFAULT_HIGHLIGHTS),
            speakers,
            duration_minutes: duration.hour() * 60 + duration.minute(),
            type_of_session: self.type_of_session.unwrap_or_default(),
            date: parse_date(self.date.as_deref().unwrap_or(DEFAULT_SESSION_DATE))?,
            start_time: parse_time(self.start_time.as_deref().unwrap_or(DEFAULT_START_TIME))?,
            location: self
                .location
                .filter(|location| !location.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        })
    }
}

fn required_name(name: Option<String>, entity: &str) -> Result<String> {
    match name {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(ConferenceError::validation(format!(
            "{entity} 'name' field required"
        ))),
    }
}

fn non_empty_or(values: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    match values {
        Some(values) if !values.is_empty() => values,
        _ => default.iter().map(ToString::to_string).collect(),
    }
}

fn prefix(raw: &str, len: usize) -> &str {
    raw.get(..len).unwrap_or(raw)
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(prefix(raw, 10), "%Y-%m-%d")
        .map_err(|_| ConferenceError::validation(format!("Invalid date: {raw:?}")))
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(prefix(raw, 5), "%H:%M")
        .map_err(|_| ConferenceError::validation(format!("Invalid time: {raw:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn conference_defaults_are_filled_in() {
        let conf = ConferenceDraft::named("RustConf")
            .into_conference(ConferenceId::new(), ProfileId::new("org"))
            .unwrap();
        assert_eq!(conf.city, "Default City");
        assert_eq!(conf.topics, ["Default", "Topic"]);
        assert_eq!(conf.month, 0);
        assert_eq!(conf.max_attendees, 0);
        assert_eq!(conf.seats_available, 0);
    }

    #[test]
    fn conference_month_comes_from_start_date() {
        let draft = ConferenceDraft {
            start_date: Some("2024-06-12T00:00:00.000Z".to_string()),
            max_attendees: Some(40),
            ..ConferenceDraft::named("RustConf")
        };
        let conf = draft
            .into_conference(ConferenceId::new(), ProfileId::new("org"))
            .unwrap();
        assert_eq!(conf.month, 6);
        assert_eq!(conf.start_date, NaiveDate::from_ymd_opt(2024, 6, 12));
        assert_eq!(conf.seats_available, 40);
    }

    #[test]
    fn missing_name_or_bad_date_is_rejected() {
        let err = ConferenceDraft::default()
            .into_conference(ConferenceId::new(), ProfileId::new("org"))
            .unwrap_err();
        assert!(matches!(err, ConferenceError::Validation(_)));

        let draft = ConferenceDraft {
            end_date: Some("next week".to_string()),
            ..ConferenceDraft::named("RustConf")
        };
        assert!(draft
            .into_conference(ConferenceId::new(), ProfileId::new("org"))
            .is_err());
    }

    #[test]
    fn session_defaults_are_filled_in() {
        let session = SessionDraft::named("Intro", ["Ada"])
            .into_session(SessionId::new(), ConferenceId::new(), Vec::new())
            .unwrap();
        assert_eq!(session.highlights, ["Default", "Highlight"]);
        assert_eq!(session.location, "Default Location");
        assert_eq!(session.type_of_session, TypeOfSession::NotSpecified);
        assert_eq!(session.date, NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(session.duration_minutes, 0);
    }

    #[test]
    fn session_times_read_only_hours_and_minutes() {
        let draft = SessionDraft {
            duration: Some("01:30:00".to_string()),
            start_time: Some("14:15:59".to_string()),
            type_of_session: Some(TypeOfSession::Workshop),
            ..SessionDraft::named("Deep dive", Vec::<String>::new())
        };
        let session = draft
            .into_session(SessionId::new(), ConferenceId::new(), Vec::new())
            .unwrap();
        assert_eq!(session.duration_minutes, 90);
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(14, 15, 0).unwrap());
    }
}
