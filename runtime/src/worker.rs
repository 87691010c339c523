//! Background job execution.
//!
//! - [`JobRunner`] maps a [`Job`] to the component that handles it.
//! - [`JobWorker`] pulls jobs from a [`JobSource`] until shutdown and runs each
//!   one with retry. A job that keeps failing is logged and dropped.
//! - [`AnnouncementScheduler`] enqueues [`Job::RefreshAnnouncement`] on a fixed
//!   interval.
//! - [`channel`] builds an in-process queue for tests and single-node use.
//!
//! Shutdown is signalled through a `tokio::sync::broadcast` channel. A worker
//! finishes the job in hand before it stops. A pending
//! [`JobSource::next_job`] is dropped on shutdown, so a source must not lose a
//! job it has taken but not yet returned; the `Redis` source keeps such jobs
//! on a processing list and delivers them again.

use crate::announcements::AnnouncementPublisher;
use crate::featured::SpeakerAggregator;
use crate::metrics::JobMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use conference_core::Result;
use conference_core::cache::Cache;
use conference_core::error::QueueError;
use conference_core::jobs::{Job, JobQueue, JobSource, QueueFuture};
use conference_core::store::ConferenceStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Default interval between announcement refreshes.
pub const DEFAULT_ANNOUNCEMENT_INTERVAL: Duration = Duration::from_secs(3600);

/// Dispatches jobs to their handlers.
#[derive(Clone)]
pub struct JobRunner {
    featured: SpeakerAggregator,
    announcements: AnnouncementPublisher,
}

impl JobRunner {
    /// Create a runner over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn ConferenceStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            featured: SpeakerAggregator::new(Arc::clone(&store), Arc::clone(&cache)),
            announcements: AnnouncementPublisher::new(store, cache),
        }
    }

    /// Run one job to completion.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn run(&self, job: &Job) -> Result<()> {
        match job {
            Job::CheckFeaturedSpeakers { conference_id } => {
                self.featured.run(*conference_id).await?;
            }
            Job::RefreshAnnouncement => {
                self.announcements.run().await?;
            }
        }
        Ok(())
    }
}

/// Pulls jobs from a source and runs them until shutdown.
pub struct JobWorker {
    runner: JobRunner,
    source: Box<dyn JobSource>,
    retry: RetryPolicy,
}

impl JobWorker {
    /// Create a worker with the default job retry policy.
    #[must_use]
    pub fn new(runner: JobRunner, source: Box<dyn JobSource>) -> Self {
        Self {
            runner,
            source,
            retry: RetryPolicy::builder()
                .max_attempts(5)
                .initial_delay(Duration::from_millis(200))
                .max_delay(Duration::from_secs(30))
                .build(),
        }
    }

    /// Replace the retry policy applied to each job.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process jobs until shutdown is signalled or the source is exhausted.
    ///
    /// Returns the number of jobs taken from the source.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> usize {
        tracing::info!("Job worker started");
        let mut processed = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                next = self.source.next_job() => Some(next),
            };

            match next {
                None => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                Some(Ok(Some(job))) => {
                    processed += 1;
                    execute(&self.runner, &self.retry, job).await;
                }
                Some(Ok(None)) => {
                    tracing::info!("Job source exhausted");
                    break;
                }
                Some(Err(QueueError::Closed)) => {
                    tracing::info!("Job source closed");
                    break;
                }
                Some(Err(error)) => {
                    tracing::error!(error = %error, "Failed to receive job");
                    tokio::time::sleep(self.retry.backoff(0)).await;
                }
            }
        }

        tracing::info!(processed, "Job worker stopped");
        processed
    }
}

/// Run one job with retry; a job that keeps failing is dropped.
async fn execute(runner: &JobRunner, retry: &RetryPolicy, job: Job) {
    let name = job.name();
    let started = Instant::now();

    match retry_with_backoff(retry, || runner.run(&job)).await {
        Ok(()) => {
            JobMetrics::record_completed(name, started.elapsed());
            tracing::debug!(job = name, "Job completed");
        }
        Err(error) => {
            JobMetrics::record_dropped(name);
            tracing::error!(
                job = name,
                attempts = retry.max_attempts,
                error = %error,
                "Dropping job after repeated failures"
            );
        }
    }
}

/// Enqueues [`Job::RefreshAnnouncement`] on a fixed interval.
///
/// The first refresh is enqueued immediately on start.
pub struct AnnouncementScheduler {
    queue: Arc<dyn JobQueue>,
    interval: Duration,
}

impl AnnouncementScheduler {
    /// Create a scheduler with the default interval (one hour).
    #[must_use]
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            interval: DEFAULT_ANNOUNCEMENT_INTERVAL,
        }
    }

    /// Set the interval between refreshes.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enqueue refreshes until shutdown is signalled.
    ///
    /// Returns the number of refreshes enqueued.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut scheduled = 0;

        tracing::info!(interval_secs = self.interval.as_secs(), "Announcement scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let job = Job::RefreshAnnouncement;
                    let name = job.name();
                    match self.queue.enqueue(job).await {
                        Ok(()) => {
                            scheduled += 1;
                            JobMetrics::record_enqueued(name);
                        }
                        Err(error) => {
                            JobMetrics::record_enqueue_failure(name);
                            tracing::warn!(
                                error = %error,
                                "Failed to schedule announcement refresh"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(scheduled, "Announcement scheduler stopped");
        scheduled
    }
}

/// Sending half of an in-process job queue.
#[derive(Clone, Debug)]
pub struct ChannelJobQueue {
    sender: mpsc::Sender<Job>,
}

impl JobQueue for ChannelJobQueue {
    fn enqueue(&self, job: Job) -> QueueFuture<'_, ()> {
        Box::pin(async move { self.sender.send(job).await.map_err(|_| QueueError::Closed) })
    }
}

/// Receiving half of an in-process job queue.
#[derive(Debug)]
pub struct ChannelJobSource {
    receiver: mpsc::Receiver<Job>,
}

impl JobSource for ChannelJobSource {
    fn next_job(&mut self) -> QueueFuture<'_, Option<Job>> {
        Box::pin(async move { Ok(self.receiver.recv().await) })
    }
}

/// Create a bounded in-process job queue.
///
/// The source reports exhaustion once every queue handle is dropped and the
/// buffer is drained.
#[must_use]
pub fn channel(capacity: usize) -> (ChannelJobQueue, ChannelJobSource) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ChannelJobQueue { sender }, ChannelJobSource { receiver })
}
