//! Catalog creation and read paths.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use conference_core::ConferenceError;
use conference_core::draft::{ConferenceDraft, SessionDraft};
use conference_core::jobs::Job;
use conference_core::query::Criterion;
use conference_core::types::{ConferenceId, TypeOfSession};
use chrono::NaiveTime;
use conference_testing::fixtures;

#[tokio::test]
async fn conference_defaults_are_applied() {
    let h = Harness::new();
    let conf = h
        .catalog
        .create_conference(&fixtures::organizer(), ConferenceDraft::named("Bare"))
        .await
        .unwrap();

    assert_eq!(conf.city, "Default City");
    assert_eq!(conf.topics, ["Default", "Topic"]);
    assert_eq!(conf.month, 0);
    assert_eq!(conf.max_attendees, 0);
    assert_eq!(conf.seats_available, 0);
    assert_eq!(h.catalog.conference(conf.id).await.unwrap(), conf);
}

#[tokio::test]
async fn nameless_conference_is_rejected() {
    let h = Harness::new();
    let err = h
        .catalog
        .create_conference(&fixtures::organizer(), ConferenceDraft::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ConferenceError::Validation(_)));
    assert_eq!(h.store.commit_count(), 0);
}

#[tokio::test]
async fn start_date_sets_month() {
    let h = Harness::new();
    let draft = ConferenceDraft {
        start_date: Some("2026-06-15T09:00:00".to_string()),
        ..fixtures::conference_draft("Summer", 10)
    };
    let conf = h
        .catalog
        .create_conference(&fixtures::organizer(), draft)
        .await
        .unwrap();
    assert_eq!(conf.month, 6);
}

#[tokio::test]
async fn only_the_organizer_adds_sessions() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    let err = h
        .catalog
        .create_session(
            &fixtures::identity("mallory"),
            conf.id,
            fixtures::session_draft("Hijack", &["Mallory"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConferenceError::PermissionDenied(_)));
    assert!(h.catalog.conference_sessions(conf.id).await.unwrap().is_empty());
    assert!(h.jobs.jobs().is_empty());
}

#[tokio::test]
async fn session_under_unknown_conference_is_not_found() {
    let h = Harness::new();
    let err = h
        .catalog
        .create_session(
            &fixtures::organizer(),
            ConferenceId::new(),
            fixtures::session_draft("Lost", &["Ada"]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

#[tokio::test]
async fn session_creation_queues_featured_check() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    h.session(conf.id, "Ownership", &["Ada Lovelace"]).await;

    assert_eq!(
        h.jobs.jobs(),
        [Job::CheckFeaturedSpeakers {
            conference_id: conf.id
        }]
    );
}

#[tokio::test]
async fn queue_failure_does_not_fail_session_creation() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;
    h.jobs.set_failing(true);

    let session = h.session(conf.id, "Ownership", &["Ada"]).await;

    assert!(h.jobs.jobs().is_empty());
    assert_eq!(h.catalog.conference_sessions(conf.id).await.unwrap(), [session]);
}

#[tokio::test]
async fn speaker_spellings_resolve_to_one_speaker() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    let first = h.session(conf.id, "Engines", &["Ada Lovelace"]).await;
    let second = h.session(conf.id, "Notes", &["  ada   LOVELACE "]).await;

    assert_eq!(first.speakers, second.speakers);
    assert_eq!(h.store.speaker_count(), 1);

    let by_speaker = h.catalog.sessions_by_speaker("ADA LOVELACE").await.unwrap();
    let names: Vec<_> = by_speaker.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Engines", "Notes"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_share_one_speaker_record() {
    const SPELLINGS: [&str; 4] = [
        "Ada Lovelace",
        "ada lovelace",
        "  ADA  Lovelace",
        "Ada\tLOVELACE ",
    ];
    const CREATORS: usize = 16;

    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    let handles: Vec<_> = (0..CREATORS)
        .map(|i| {
            let catalog = h.catalog.clone();
            let speaker = SPELLINGS[i % SPELLINGS.len()];
            let draft = fixtures::session_draft(&format!("Talk {i:02}"), &[speaker]);
            tokio::spawn(async move {
                catalog
                    .create_session(&fixtures::organizer(), conf.id, draft)
                    .await
            })
        })
        .collect();

    for handle in handles {
        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.speakers.len(), 1);
        assert_eq!(session.speakers[0].as_str(), "ada lovelace");
    }

    assert_eq!(h.store.speaker_count(), 1);
    let sessions = h.catalog.sessions_by_speaker("Ada Lovelace").await.unwrap();
    assert_eq!(sessions.len(), CREATORS);
}

#[tokio::test]
async fn workshops_and_late_sessions_are_excluded() {
    let h = Harness::new();
    let rust = h.conference("RustConf", 10).await;
    let go = h.conference("GoConf", 10).await;

    let draft = |name: &str, kind: TypeOfSession, start: &str| SessionDraft {
        type_of_session: Some(kind),
        start_time: Some(start.to_string()),
        ..fixtures::session_draft(name, &["Ada"])
    };
    let create = |conference: ConferenceId, draft: SessionDraft| {
        let catalog = h.catalog.clone();
        async move {
            catalog
                .create_session(&fixtures::organizer(), conference, draft)
                .await
                .unwrap()
        }
    };

    create(rust.id, draft("Hands On", TypeOfSession::Workshop, "09:00")).await;
    create(rust.id, draft("Late Keynote", TypeOfSession::Keynote, "20:00")).await;
    create(rust.id, draft("Closing", TypeOfSession::Lecture, "19:00")).await;
    create(go.id, draft("Mixer", TypeOfSession::Networking, "18:30")).await;
    create(go.id, draft("Untyped", TypeOfSession::NotSpecified, "10:00")).await;

    let seven_pm = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
    let sessions = h
        .catalog
        .sessions_not_of_type_before(TypeOfSession::Workshop, seven_pm)
        .await
        .unwrap();

    let names: Vec<_> = sessions.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Closing", "Mixer", "Untyped"]);
}

#[tokio::test]
async fn repeated_speaker_in_one_session_is_listed_once() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    let session = h
        .session(conf.id, "Pairing", &["Grace Hopper", "grace hopper", "Ada"])
        .await;

    let ids: Vec<_> = session.speakers.iter().map(|s| s.as_str()).collect();
    assert_eq!(ids, ["grace hopper", "ada"]);
}

#[tokio::test]
async fn blank_speaker_name_is_rejected() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    let err = h
        .catalog
        .create_session(
            &fixtures::organizer(),
            conf.id,
            fixtures::session_draft("Anonymous", &["   "]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConferenceError::Validation(_)));
    assert_eq!(h.store.speaker_count(), 0);
}

#[tokio::test]
async fn unknown_speaker_is_not_found() {
    let h = Harness::new();
    let err = h.catalog.sessions_by_speaker("Nobody").await.unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

#[tokio::test]
async fn sessions_filter_by_type_and_speaker() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;
    let other = h.conference("GoConf", 10).await;

    let keynote = h
        .catalog
        .create_session(
            &fixtures::organizer(),
            conf.id,
            SessionDraft {
                type_of_session: Some(TypeOfSession::Keynote),
                ..fixtures::session_draft("Opening", &["Ada"])
            },
        )
        .await
        .unwrap();
    h.session(conf.id, "Workshop", &["Grace"]).await;
    h.session(other.id, "Elsewhere", &["Ada"]).await;

    let keynotes = h
        .catalog
        .conference_sessions_by_type(conf.id, TypeOfSession::Keynote)
        .await
        .unwrap();
    assert_eq!(keynotes, [keynote.clone()]);

    let by_ada = h
        .catalog
        .conference_sessions_by_speaker(conf.id, "ada")
        .await
        .unwrap();
    assert_eq!(by_ada, [keynote]);

    assert_eq!(h.catalog.sessions_by_speaker("Ada").await.unwrap().len(), 2);
}

#[tokio::test]
async fn created_and_attended_conferences() {
    let h = Harness::new();
    let rust = h.conference("RustConf", 10).await;
    let go = h.conference("GoConf", 10).await;
    let ada = fixtures::identity("ada");

    let created = h
        .catalog
        .conferences_created(&fixtures::organizer())
        .await
        .unwrap();
    let names: Vec<_> = created.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["GoConf", "RustConf"]);

    assert!(h.catalog.conferences_to_attend(&ada).await.unwrap().is_empty());
    h.ledger.register(&ada, rust.id).await.unwrap();
    h.ledger.register(&ada, go.id).await.unwrap();

    let attending = h.catalog.conferences_to_attend(&ada).await.unwrap();
    let ids: Vec<_> = attending.iter().map(|c| c.id).collect();
    assert_eq!(ids, [rust.id, go.id]);
}

#[tokio::test]
async fn wishlist_skips_deleted_sessions() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;
    let kept = h.session(conf.id, "Kept", &["Ada"]).await;
    let removed = h.session(conf.id, "Removed", &["Ada"]).await;
    let ada = fixtures::identity("ada");

    h.ledger.add_to_wishlist(&ada, removed.id).await.unwrap();
    h.ledger.add_to_wishlist(&ada, kept.id).await.unwrap();
    h.store.remove_session(removed.id);

    assert_eq!(h.catalog.wishlist(&ada).await.unwrap(), [kept]);
}

async fn query_fixture(h: &Harness) {
    let drafts = [
        ("Alpha", "London", &["Rust", "Web"][..], "2026-03-01", 50),
        ("Beta", "Paris", &["Rust"][..], "2026-06-01", 200),
        ("Gamma", "London", &["Go"][..], "2026-06-10", 500),
    ];
    for (name, city, topics, start, seats) in drafts {
        let draft = ConferenceDraft {
            city: Some(city.to_string()),
            topics: Some(topics.iter().map(ToString::to_string).collect()),
            start_date: Some(start.to_string()),
            ..fixtures::conference_draft(name, seats)
        };
        h.catalog
            .create_conference(&fixtures::organizer(), draft)
            .await
            .unwrap();
    }
}

async fn query_names(h: &Harness, criteria: &[Criterion]) -> Vec<String> {
    h.catalog
        .query_conferences(criteria)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

#[tokio::test]
async fn query_without_filters_lists_by_name() {
    let h = Harness::new();
    query_fixture(&h).await;
    assert_eq!(query_names(&h, &[]).await, ["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn query_equality_filters_combine() {
    let h = Harness::new();
    query_fixture(&h).await;

    let london_in_june = [
        Criterion::new("CITY", "EQ", "London"),
        Criterion::new("MONTH", "EQ", "6"),
    ];
    assert_eq!(query_names(&h, &london_in_june).await, ["Gamma"]);

    let rust = [Criterion::new("TOPIC", "EQ", "Rust")];
    assert_eq!(query_names(&h, &rust).await, ["Alpha", "Beta"]);
}

#[tokio::test]
async fn query_inequality_sorts_by_its_field_first() {
    let h = Harness::new();
    query_fixture(&h).await;

    let big = [Criterion::new("MAX_ATTENDEES", "GT", "100")];
    assert_eq!(query_names(&h, &big).await, ["Beta", "Gamma"]);

    let small_first = [Criterion::new("MAX_ATTENDEES", "NE", "200")];
    assert_eq!(query_names(&h, &small_first).await, ["Alpha", "Gamma"]);
}

#[tokio::test]
async fn query_rejects_bad_criteria() {
    let h = Harness::new();
    query_fixture(&h).await;

    let cases = [
        vec![Criterion::new("COLOR", "EQ", "red")],
        vec![Criterion::new("CITY", "LIKE", "Lon")],
        vec![Criterion::new("MONTH", "EQ", "June")],
        vec![
            Criterion::new("MONTH", "GT", "3"),
            Criterion::new("MAX_ATTENDEES", "LT", "100"),
        ],
    ];
    for criteria in cases {
        let err = h.catalog.query_conferences(&criteria).await.unwrap_err();
        assert!(matches!(err, ConferenceError::Validation(_)), "{criteria:?}");
    }
}
