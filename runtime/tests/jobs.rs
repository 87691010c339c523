//! Background jobs: featured speakers, announcements and the worker loop.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use conference_core::jobs::{Job, JobQueue};
use conference_runtime::worker::channel;
use conference_runtime::{JobWorker, RetryPolicy};
use conference_testing::fixtures;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("conference=debug")
        .with_test_writer()
        .try_init();
}

async fn drain(h: &Harness) {
    for job in h.jobs.take_jobs() {
        assert_ok!(h.runner.run(&job).await);
    }
}

#[tokio::test]
async fn featured_summary_is_published_then_cleared() {
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;

    h.session(conf.id, "Engines", &["Ada Lovelace"]).await;
    drain(&h).await;
    assert_eq!(h.catalog.featured_speakers(conf.id).await.unwrap(), None);

    let notes = h
        .session(conf.id, "Notes", &["ada  lovelace", "Charles Babbage"])
        .await;
    drain(&h).await;
    assert_eq!(
        h.catalog.featured_speakers(conf.id).await.unwrap().as_deref(),
        Some("Featured speakers: Ada Lovelace (Engines, Notes)")
    );

    h.store.remove_session(notes.id);
    assert_ok!(
        h.runner
            .run(&Job::CheckFeaturedSpeakers {
                conference_id: conf.id
            })
            .await
    );
    assert_eq!(h.catalog.featured_speakers(conf.id).await.unwrap(), None);
}

#[tokio::test]
async fn featured_summaries_are_per_conference() {
    let h = Harness::new();
    let rust = h.conference("RustConf", 10).await;
    let go = h.conference("GoConf", 10).await;

    h.session(rust.id, "A", &["Grace"]).await;
    h.session(go.id, "B", &["Grace"]).await;
    drain(&h).await;

    assert_eq!(h.catalog.featured_speakers(rust.id).await.unwrap(), None);
    assert_eq!(h.catalog.featured_speakers(go.id).await.unwrap(), None);
}

#[tokio::test]
async fn announcement_lists_nearly_sold_out_conferences() {
    let h = Harness::new();
    let small = h.conference("Small", 2).await;
    h.conference("Tiny", 1).await;
    h.conference("Empty", 0).await;
    h.conference("Huge", 500).await;

    assert_ok!(h.runner.run(&Job::RefreshAnnouncement).await);
    assert_eq!(
        h.catalog.announcement().await.unwrap().as_deref(),
        Some("Last chance to attend! The following conferences are nearly sold out: Small, Tiny")
    );

    for attendee in fixtures::attendees(2) {
        h.ledger.register(&attendee, small.id).await.unwrap();
    }
    assert_ok!(h.runner.run(&Job::RefreshAnnouncement).await);
    assert_eq!(
        h.catalog.announcement().await.unwrap().as_deref(),
        Some("Last chance to attend! The following conferences are nearly sold out: Tiny")
    );
}

#[tokio::test]
async fn announcement_is_cleared_when_nothing_qualifies() {
    let h = Harness::new();
    let tiny = h.conference("Tiny", 1).await;

    assert_ok!(h.runner.run(&Job::RefreshAnnouncement).await);
    assert!(h.catalog.announcement().await.unwrap().is_some());

    h.ledger
        .register(&fixtures::identity("ada"), tiny.id)
        .await
        .unwrap();
    assert_ok!(h.runner.run(&Job::RefreshAnnouncement).await);
    assert_eq!(h.catalog.announcement().await.unwrap(), None);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn cache_failure_fails_the_job() {
    let h = Harness::new();
    h.conference("Tiny", 1).await;
    h.cache.fail_next_calls(1);

    assert_err!(h.runner.run(&Job::RefreshAnnouncement).await);
    assert_ok!(h.runner.run(&Job::RefreshAnnouncement).await);
}

#[tokio::test]
async fn worker_drops_failing_job_and_keeps_going() {
    init_tracing();
    let h = Harness::new();
    let conf = h.conference("RustConf", 10).await;
    h.session(conf.id, "Engines", &["Ada"]).await;
    h.session(conf.id, "Notes", &["Ada"]).await;

    let (queue, source) = channel(8);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = JobWorker::new(h.runner.clone(), Box::new(source))
        .with_retry_policy(RetryPolicy::immediate(2));

    // Both attempts of the first job hit the failing cache.
    h.cache.fail_next_calls(2);
    let job = Job::CheckFeaturedSpeakers {
        conference_id: conf.id,
    };
    queue.enqueue(job.clone()).await.unwrap();
    queue.enqueue(job).await.unwrap();
    drop(queue);

    assert_eq!(worker.run(shutdown_rx).await, 2);
    assert_eq!(
        h.catalog.featured_speakers(conf.id).await.unwrap().as_deref(),
        Some("Featured speakers: Ada (Engines, Notes)")
    );
}

#[tokio::test]
async fn worker_stops_on_shutdown() {
    let h = Harness::new();
    let (queue, source) = channel(8);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = tokio::spawn(JobWorker::new(h.runner.clone(), Box::new(source)).run(shutdown_rx));
    tokio::task::yield_now().await;
    shutdown_tx.send(()).unwrap();

    assert_eq!(handle.await.unwrap(), 0);
    drop(queue);
}
