//! Shared harness for runtime integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use conference_core::types::{Conference, ConferenceId, Session};
use conference_runtime::{Catalog, CapacityLedger, JobRunner, RetryPolicy};
use conference_testing::{InMemoryCache, InMemoryStore, RecordingJobQueue, fixtures};
use std::sync::Arc;

/// Runtime components wired to in-memory collaborators.
pub struct Harness {
    pub store: InMemoryStore,
    pub cache: InMemoryCache,
    pub jobs: RecordingJobQueue,
    pub ledger: CapacityLedger,
    pub catalog: Catalog,
    pub runner: JobRunner,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let cache = InMemoryCache::new();
        let jobs = RecordingJobQueue::new();

        Self {
            ledger: CapacityLedger::new(Arc::new(store.clone()))
                .with_retry_policy(RetryPolicy::immediate(3)),
            catalog: Catalog::new(
                Arc::new(store.clone()),
                Arc::new(cache.clone()),
                Arc::new(jobs.clone()),
            ),
            runner: JobRunner::new(Arc::new(store.clone()), Arc::new(cache.clone())),
            store,
            cache,
            jobs,
        }
    }

    /// Create a conference organized by the fixture organizer.
    pub async fn conference(&self, name: &str, seats: u32) -> Conference {
        self.catalog
            .create_conference(&fixtures::organizer(), fixtures::conference_draft(name, seats))
            .await
            .unwrap()
    }

    /// Create a session as the fixture organizer.
    pub async fn session(
        &self,
        conference: ConferenceId,
        name: &str,
        speakers: &[&str],
    ) -> Session {
        self.catalog
            .create_session(
                &fixtures::organizer(),
                conference,
                fixtures::session_draft(name, speakers),
            )
            .await
            .unwrap()
    }
}
