//! Capacity ledger: seat counting and wishlist membership.
//!
//! Every operation is one optimistic transaction. It reads the records it
//! needs together with their versions, decides, and commits a [`WriteSet`]
//! naming those versions. A [`StoreError::WriteConflict`] means another writer
//! got there first; the whole transaction is re-run from fresh reads, up to
//! the retry policy's attempt budget. When the budget runs out the caller sees
//! `Conflict(Contention)` and nothing has been written.
//!
//! No lock is held across I/O.
//!
//! [`StoreError::WriteConflict`]: conference_core::error::StoreError::WriteConflict

use crate::metrics::LedgerMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use conference_core::store::{ConferenceStore, Record, WriteSet};
use conference_core::types::{ConferenceId, Identity, Profile, SessionId};
use conference_core::version::ExpectedVersion;
use conference_core::{ConferenceError, ConflictReason, EntityKind, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Atomic registration and wishlist operations.
#[derive(Clone)]
pub struct CapacityLedger {
    store: Arc<dyn ConferenceStore>,
    retry: RetryPolicy,
}

impl CapacityLedger {
    /// Create a ledger with the default policy (3 attempts).
    #[must_use]
    pub fn new(store: Arc<dyn ConferenceStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used on write conflicts.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy used on write conflicts.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Get the caller's profile, creating it on first access.
    ///
    /// A new profile takes its display name and email from the identity.
    /// When two first accesses race, one insert wins and the other re-reads.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the store fails.
    pub async fn profile(&self, identity: &Identity) -> Result<Profile> {
        self.transact("profile", || self.get_or_create_profile(identity))
            .await
    }

    /// Take a seat in a conference.
    ///
    /// The profile's attending set and the conference's seat counter change
    /// in one atomic commit. Returns `true` when the seat was taken.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Conflict`]: already registered, no seats left, or
    ///   contention outlasted the retry budget
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn register(&self, identity: &Identity, conference: ConferenceId) -> Result<bool> {
        let result = self
            .transact("register", || self.try_register(identity, conference))
            .await;

        LedgerMetrics::record_registration(match &result {
            Ok(_) => "accepted",
            Err(ConferenceError::Conflict(ConflictReason::AlreadyRegistered)) => {
                "already_registered"
            }
            Err(ConferenceError::Conflict(ConflictReason::NoSeatsAvailable)) => "sold_out",
            Err(ConferenceError::Conflict(ConflictReason::Contention)) => "contention",
            Err(_) => "error",
        });

        if result.is_ok() {
            tracing::info!(
                user = %identity.user_id,
                conference = %conference,
                "Registered for conference"
            );
        }
        result
    }

    /// Give back a seat.
    ///
    /// Returns `false` without writing anything when the caller was not
    /// attending.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the conference does not exist
    /// - [`ConferenceError::Conflict`]: contention outlasted the retry budget
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn unregister(&self, identity: &Identity, conference: ConferenceId) -> Result<bool> {
        let released = self
            .transact("unregister", || self.try_unregister(identity, conference))
            .await?;

        if released {
            LedgerMetrics::record_unregistration();
            tracing::info!(
                user = %identity.user_id,
                conference = %conference,
                "Unregistered from conference"
            );
        }
        Ok(released)
    }

    /// Put a session on the caller's wishlist.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::NotFound`]: the session does not exist
    /// - [`ConferenceError::Conflict`]: already on the wishlist, or contention
    ///   outlasted the retry budget
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn add_to_wishlist(&self, identity: &Identity, session: SessionId) -> Result<()> {
        self.transact("wishlist_add", || self.try_add_to_wishlist(identity, session))
            .await?;

        LedgerMetrics::record_wishlist("added");
        tracing::debug!(user = %identity.user_id, session = %session, "Added session to wishlist");
        Ok(())
    }

    /// Take a session off the caller's wishlist.
    ///
    /// Idempotent: returns `false` when the session was not on the wishlist.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::Conflict`]: contention outlasted the retry budget
    /// - [`ConferenceError::Store`]: the store failed
    pub async fn remove_from_wishlist(
        &self,
        identity: &Identity,
        session: SessionId,
    ) -> Result<bool> {
        let removed = self
            .transact("wishlist_remove", || {
                self.try_remove_from_wishlist(identity, session)
            })
            .await?;

        if removed {
            LedgerMetrics::record_wishlist("removed");
        }
        Ok(removed)
    }

    async fn try_register(&self, identity: &Identity, conference_id: ConferenceId) -> Result<bool> {
        let conference = self
            .store
            .conference(conference_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found(EntityKind::Conference, conference_id))?;
        let (mut profile, profile_expected) = self.load_profile(identity).await?;

        if profile.attends(&conference_id) {
            return Err(ConferenceError::Conflict(ConflictReason::AlreadyRegistered));
        }

        let version = conference.version;
        let mut conference = conference.into_inner();
        if !conference.take_seat() {
            return Err(ConferenceError::Conflict(ConflictReason::NoSeatsAvailable));
        }
        profile.add_attendance(conference_id);

        self.store
            .commit(
                WriteSet::new()
                    .write(Record::Profile(profile), profile_expected)
                    .update(Record::Conference(conference), version),
            )
            .await?;
        Ok(true)
    }

    async fn try_unregister(
        &self,
        identity: &Identity,
        conference_id: ConferenceId,
    ) -> Result<bool> {
        let conference = self
            .store
            .conference(conference_id)
            .await?
            .ok_or_else(|| ConferenceError::not_found(EntityKind::Conference, conference_id))?;
        let (mut profile, profile_expected) = self.load_profile(identity).await?;

        if !profile.remove_attendance(&conference_id) {
            return Ok(false);
        }

        let version = conference.version;
        let mut conference = conference.into_inner();
        conference.release_seat();

        self.store
            .commit(
                WriteSet::new()
                    .write(Record::Profile(profile), profile_expected)
                    .update(Record::Conference(conference), version),
            )
            .await?;
        Ok(true)
    }

    async fn try_add_to_wishlist(&self, identity: &Identity, session: SessionId) -> Result<()> {
        if self.store.session(session).await?.is_none() {
            return Err(ConferenceError::not_found(EntityKind::Session, session));
        }
        let (mut profile, expected) = self.load_profile(identity).await?;

        if !profile.add_to_wishlist(session) {
            return Err(ConferenceError::Conflict(ConflictReason::AlreadyOnWishlist));
        }

        self.store
            .commit(WriteSet::new().write(Record::Profile(profile), expected))
            .await?;
        Ok(())
    }

    async fn try_remove_from_wishlist(
        &self,
        identity: &Identity,
        session: SessionId,
    ) -> Result<bool> {
        let (mut profile, expected) = self.load_profile(identity).await?;

        if !profile.remove_from_wishlist(&session) {
            return Ok(false);
        }

        self.store
            .commit(WriteSet::new().write(Record::Profile(profile), expected))
            .await?;
        Ok(true)
    }

    async fn get_or_create_profile(&self, identity: &Identity) -> Result<Profile> {
        match self.load_profile(identity).await? {
            (profile, ExpectedVersion::Absent) => {
                self.store
                    .commit(WriteSet::new().insert(Record::Profile(profile.clone())))
                    .await?;
                tracing::info!(user = %identity.user_id, "Created profile");
                Ok(profile)
            }
            (profile, ExpectedVersion::Exact(_)) => Ok(profile),
        }
    }

    /// The stored profile and its version, or a fresh one that must be
    /// inserted by the same commit.
    async fn load_profile(&self, identity: &Identity) -> Result<(Profile, ExpectedVersion)> {
        Ok(match self.store.profile(identity.user_id.clone()).await? {
            Some(stored) => {
                let expected = stored.expected();
                (stored.into_inner(), expected)
            }
            None => (Profile::for_identity(identity), ExpectedVersion::Absent),
        })
    }

    /// Run `attempt` until it commits, retrying write conflicts only.
    async fn transact<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        let result = retry_with_predicate(
            &self.retry,
            || {
                attempts += 1;
                attempt()
            },
            ConferenceError::is_write_conflict,
        )
        .await;

        LedgerMetrics::record_duration(operation, started.elapsed());
        if attempts > 1 {
            LedgerMetrics::record_contention_retries(operation, attempts - 1);
        }

        match result {
            Err(error) if error.is_write_conflict() => {
                tracing::error!(
                    operation,
                    attempts,
                    error = %error,
                    "Giving up after repeated write conflicts"
                );
                LedgerMetrics::record_contention_exhausted(operation);
                Err(ConferenceError::Conflict(ConflictReason::Contention))
            }
            other => other,
        }
    }
}
