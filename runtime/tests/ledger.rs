//! Capacity ledger behaviour against the in-memory store.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use conference_core::types::{ConferenceId, SessionId};
use conference_core::{ConferenceError, ConflictReason};
use conference_runtime::{CapacityLedger, RetryPolicy};
use conference_testing::fixtures;
use futures::future::join_all;
use proptest::prelude::*;
use std::sync::Arc;

#[tokio::test]
async fn register_takes_a_seat_and_records_attendance() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 2).await;
    let ada = fixtures::identity("ada");

    assert!(h.ledger.register(&ada, conf.id).await.unwrap());

    assert_eq!(h.store.seats_available(conf.id), Some(1));
    let profile = h.store.stored_profile(&ada.user_id).unwrap();
    assert_eq!(profile.conferences_to_attend, [conf.id]);
    assert_eq!(profile.display_name, "ada");
    assert_eq!(profile.main_email, "ada@example.com");
}

#[tokio::test]
async fn register_then_unregister_restores_state() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let ada = fixtures::identity("ada");
    h.ledger.profile(&ada).await.unwrap();

    h.ledger.register(&ada, conf.id).await.unwrap();
    assert!(h.ledger.unregister(&ada, conf.id).await.unwrap());

    assert_eq!(h.store.seats_available(conf.id), Some(5));
    assert!(
        h.store
            .stored_profile(&ada.user_id)
            .unwrap()
            .conferences_to_attend
            .is_empty()
    );
}

#[tokio::test]
async fn double_registration_is_a_conflict() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let ada = fixtures::identity("ada");

    h.ledger.register(&ada, conf.id).await.unwrap();
    let err = h.ledger.register(&ada, conf.id).await.unwrap_err();

    assert_eq!(err.conflict_reason(), Some(ConflictReason::AlreadyRegistered));
    assert_eq!(err.to_string(), "Conflict: already registered");
    assert_eq!(h.store.seats_available(conf.id), Some(4));
}

#[tokio::test]
async fn sold_out_conference_rejects_registration() {
    let h = Harness::new();
    let conf = h.conference("Tiny", 0).await;

    let err = h
        .ledger
        .register(&fixtures::identity("ada"), conf.id)
        .await
        .unwrap_err();

    assert_eq!(err.conflict_reason(), Some(ConflictReason::NoSeatsAvailable));
    assert_eq!(h.store.seats_available(conf.id), Some(0));
}

#[tokio::test]
async fn unknown_conference_is_not_found() {
    let h = Harness::new();
    let ada = fixtures::identity("ada");

    let err = h.ledger.register(&ada, ConferenceId::new()).await.unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));

    let err = h.ledger.unregister(&ada, ConferenceId::new()).await.unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

#[tokio::test]
async fn unregister_without_registration_writes_nothing() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let commits = h.store.commit_count();

    let released = h
        .ledger
        .unregister(&fixtures::identity("ada"), conf.id)
        .await
        .unwrap();

    assert!(!released);
    assert_eq!(h.store.commit_count(), commits);
    assert_eq!(h.store.seats_available(conf.id), Some(5));
}

#[tokio::test]
async fn concurrent_registrations_never_oversell() {
    const SEATS: u32 = 3;
    const CALLERS: usize = 10;

    let h = Harness::new();
    let conf = h.conference("Popular", SEATS).await;
    let attendees = fixtures::attendees(CALLERS);

    let results = join_all(
        attendees
            .iter()
            .map(|attendee| h.ledger.register(attendee, conf.id)),
    )
    .await;

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results
        .iter()
        .filter(|r| {
            r.as_ref()
                .err()
                .and_then(ConferenceError::conflict_reason)
                == Some(ConflictReason::NoSeatsAvailable)
        })
        .count();

    assert_eq!(accepted, SEATS as usize);
    assert_eq!(sold_out, CALLERS - SEATS as usize);
    assert_eq!(h.store.seats_available(conf.id), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_registrations_never_oversell() {
    const SEATS: u32 = 5;
    const CALLERS: usize = 20;

    let h = Harness::new();
    let conf = h.conference("Popular", SEATS).await;
    // Every conflict means another caller committed, so CALLERS + 1 attempts
    // can never be exhausted.
    let ledger = Arc::new(
        CapacityLedger::new(Arc::new(h.store.clone()))
            .with_retry_policy(RetryPolicy::immediate(CALLERS as u32 + 1)),
    );

    let handles: Vec<_> = fixtures::attendees(CALLERS)
        .into_iter()
        .map(|attendee| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.register(&attendee, conf.id).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(err.conflict_reason(), Some(ConflictReason::NoSeatsAvailable)),
        }
    }

    assert_eq!(accepted, SEATS);
    assert_eq!(h.store.seats_available(conf.id), Some(0));
}

#[tokio::test]
async fn exhausted_retries_report_contention_and_write_nothing() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let ada = fixtures::identity("ada");
    h.store.fail_next_commits(3);

    let err = h.ledger.register(&ada, conf.id).await.unwrap_err();

    assert_eq!(err.conflict_reason(), Some(ConflictReason::Contention));
    assert_eq!(err.to_string(), "Conflict: contention, try again");
    assert_eq!(h.store.seats_available(conf.id), Some(5));
    assert!(h.store.stored_profile(&ada.user_id).is_none());
}

#[tokio::test]
async fn transient_conflicts_are_retried() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let ada = fixtures::identity("ada");
    h.store.fail_next_commits(2);

    assert!(h.ledger.register(&ada, conf.id).await.unwrap());
    assert_eq!(h.store.seats_available(conf.id), Some(4));
}

#[tokio::test]
async fn profile_is_created_once() {
    let h = Harness::new();
    let ada = fixtures::identity("ada");

    let created = h.ledger.profile(&ada).await.unwrap();
    let commits = h.store.commit_count();
    let again = h.ledger.profile(&ada).await.unwrap();

    assert_eq!(created, again);
    assert_eq!(h.store.commit_count(), commits);
}

#[tokio::test]
async fn wishlist_add_twice_conflicts_and_remove_is_idempotent() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 5).await;
    let session = h.session(conf.id, "Ownership", &["Ada"]).await;
    let ada = fixtures::identity("ada");

    h.ledger.add_to_wishlist(&ada, session.id).await.unwrap();
    let err = h.ledger.add_to_wishlist(&ada, session.id).await.unwrap_err();
    assert_eq!(err.conflict_reason(), Some(ConflictReason::AlreadyOnWishlist));

    assert!(h.ledger.remove_from_wishlist(&ada, session.id).await.unwrap());
    assert!(!h.ledger.remove_from_wishlist(&ada, session.id).await.unwrap());
    assert!(
        h.store
            .stored_profile(&ada.user_id)
            .unwrap()
            .sessions_on_wishlist
            .is_empty()
    );
}

#[tokio::test]
async fn wishlist_add_requires_existing_session() {
    let h = Harness::new();
    let err = h
        .ledger
        .add_to_wishlist(&fixtures::identity("ada"), SessionId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ConferenceError::NotFound { .. }));
}

#[derive(Clone, Debug)]
enum Op {
    Register(usize),
    Unregister(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize).prop_map(Op::Register),
        (0..4usize).prop_map(Op::Unregister),
    ]
}

proptest! {
    #[test]
    fn seats_stay_within_bounds(seats in 0u32..4, ops in prop::collection::vec(op(), 0..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let h = Harness::new();
            let conf = h.conference("Bounded", seats).await;
            let attendees = fixtures::attendees(4);

            for op in ops {
                let _ = match op {
                    Op::Register(i) => h.ledger.register(&attendees[i], conf.id).await,
                    Op::Unregister(i) => h.ledger.unregister(&attendees[i], conf.id).await,
                };

                let available = h.store.seats_available(conf.id).unwrap();
                let attending = attendees
                    .iter()
                    .filter_map(|a| h.store.stored_profile(&a.user_id))
                    .filter(|p| p.attends(&conf.id))
                    .count();

                prop_assert!(available <= seats);
                prop_assert_eq!(available as usize + attending, seats as usize);
            }
            Ok(())
        })?;
    }
}
