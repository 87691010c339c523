//! Ready-made identities, drafts and entities.

use conference_core::draft::{ConferenceDraft, SessionDraft};
use conference_core::types::{Conference, ConferenceId, Identity, Profile};

/// Identity whose user id, nickname and email derive from `user`.
#[must_use]
pub fn identity(user: &str) -> Identity {
    Identity::new(user, user, format!("{user}@example.com"))
}

/// The identity used to organize fixture conferences.
#[must_use]
pub fn organizer() -> Identity {
    identity("organizer")
}

/// `count` distinct attendee identities.
#[must_use]
pub fn attendees(count: usize) -> Vec<Identity> {
    (0..count).map(|i| identity(&format!("attendee-{i}"))).collect()
}

/// Fresh profile for `user`.
#[must_use]
pub fn profile(user: &str) -> Profile {
    Profile::for_identity(&identity(user))
}

/// Draft of a conference with `seats` seats.
#[must_use]
pub fn conference_draft(name: &str, seats: u32) -> ConferenceDraft {
    ConferenceDraft {
        max_attendees: Some(seats),
        ..ConferenceDraft::named(name)
    }
}

/// Conference organized by [`organizer`], built without a store.
#[must_use]
pub fn conference(name: &str, seats: u32) -> Conference {
    conference_draft(name, seats)
        .into_conference(ConferenceId::new(), organizer().user_id)
        .unwrap()
}

/// Draft of a session given by `speakers`.
#[must_use]
pub fn session_draft(name: &str, speakers: &[&str]) -> SessionDraft {
    SessionDraft::named(name, speakers.iter().copied())
}
