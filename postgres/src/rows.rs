//! Mapping between table rows and domain records.

use chrono::{NaiveDate, NaiveTime};
use conference_core::error::StoreError;
use conference_core::types::{
    Conference, ConferenceId, Profile, ProfileId, Session, SessionId, Speaker, SpeakerId,
};
use conference_core::version::{Version, Versioned};
use uuid::Uuid;

/// Column list shared by every conference `SELECT`.
pub(crate) const CONFERENCE_COLUMNS: &str = "id, organizer, name, description, city, topics, \
     start_date, end_date, month, max_attendees, seats_available, version";

/// Column list shared by every session `SELECT`.
pub(crate) const SESSION_COLUMNS: &str = "id, conference_id, name, highlights, speakers, \
     duration_minutes, type_of_session, date, start_time, location, version";

#[derive(sqlx::FromRow)]
pub(crate) struct ConferenceRow {
    id: Uuid,
    organizer: String,
    name: String,
    description: Option<String>,
    city: String,
    topics: Vec<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    month: i32,
    max_attendees: i32,
    seats_available: i32,
    version: i64,
}

impl TryFrom<ConferenceRow> for Versioned<Conference> {
    type Error = StoreError;

    fn try_from(row: ConferenceRow) -> Result<Self, StoreError> {
        let conference = Conference {
            id: ConferenceId::from_uuid(row.id),
            organizer: ProfileId::new(row.organizer),
            name: row.name,
            description: row.description,
            city: row.city,
            topics: row.topics,
            start_date: row.start_date,
            end_date: row.end_date,
            month: to_u32(row.month, "month")?,
            max_attendees: to_u32(row.max_attendees, "max_attendees")?,
            seats_available: to_u32(row.seats_available, "seats_available")?,
        };
        Ok(Self::new(conference, to_version(row.version)?))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    id: Uuid,
    conference_id: Uuid,
    name: String,
    highlights: Vec<String>,
    speakers: Vec<String>,
    duration_minutes: i32,
    type_of_session: String,
    date: NaiveDate,
    start_time: NaiveTime,
    location: String,
    version: i64,
}

impl TryFrom<SessionRow> for Versioned<Session> {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, StoreError> {
        let session = Session {
            id: SessionId::from_uuid(row.id),
            conference_id: ConferenceId::from_uuid(row.conference_id),
            name: row.name,
            highlights: row.highlights,
            speakers: row.speakers.into_iter().map(SpeakerId::from_normalized).collect(),
            duration_minutes: to_u32(row.duration_minutes, "duration_minutes")?,
            type_of_session: row
                .type_of_session
                .parse()
                .map_err(|e| StoreError::Serialization(format!("type_of_session: {e}")))?,
            date: row.date,
            start_time: row.start_time,
            location: row.location,
        };
        Ok(Self::new(session, to_version(row.version)?))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ProfileRow {
    id: String,
    display_name: String,
    main_email: String,
    tee_shirt_size: String,
    conferences_to_attend: Vec<Uuid>,
    sessions_on_wishlist: Vec<Uuid>,
    version: i64,
}

impl TryFrom<ProfileRow> for Versioned<Profile> {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, StoreError> {
        let profile = Profile {
            id: ProfileId::new(row.id),
            display_name: row.display_name,
            main_email: row.main_email,
            tee_shirt_size: row
                .tee_shirt_size
                .parse()
                .map_err(|e| StoreError::Serialization(format!("tee_shirt_size: {e}")))?,
            conferences_to_attend: row
                .conferences_to_attend
                .into_iter()
                .map(ConferenceId::from_uuid)
                .collect(),
            sessions_on_wishlist: row
                .sessions_on_wishlist
                .into_iter()
                .map(SessionId::from_uuid)
                .collect(),
        };
        Ok(Self::new(profile, to_version(row.version)?))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SpeakerRow {
    id: String,
    name: String,
}

impl From<SpeakerRow> for Speaker {
    fn from(row: SpeakerRow) -> Self {
        Self {
            id: SpeakerId::from_normalized(row.id),
            name: row.name,
        }
    }
}

/// Convert rows, failing on the first one that does not decode.
pub(crate) fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    Versioned<T>: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .map(|row| Versioned::<T>::try_from(row).map(Versioned::into_inner))
        .collect()
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{column} is negative: {value}")))
}

fn to_version(value: i64) -> Result<Version, StoreError> {
    u64::try_from(value)
        .map(Version::new)
        .map_err(|_| StoreError::Serialization(format!("version is negative: {value}")))
}

/// Encode a `u32` for an `INTEGER` column.
pub(crate) fn to_i32(value: u32, column: &str) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{column} out of range: {value}")))
}

/// Encode a version for the `BIGINT` column.
pub(crate) fn version_to_i64(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value()).map_err(|_| {
        StoreError::Serialization(format!("version out of range: {}", version.value()))
    })
}
