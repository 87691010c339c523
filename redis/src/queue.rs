//! Durable job queue on a `Redis` list.
//!
//! Producers `RPUSH` JSON-encoded jobs. A worker `BLMOVE`s each job onto its
//! own processing list and removes it from there when it asks for the next
//! job, so the job it was handed has been run by then. A job moved while the
//! worker was shutting down or crashing stays on the processing list and is
//! delivered again when a source with the same processing key starts.
//! Delivery is at least once; every job is idempotent.

use conference_core::error::QueueError;
use conference_core::jobs::{Job, JobQueue, JobSource, QueueFuture};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction};
use std::time::Duration;

/// List key used when none is configured.
pub const DEFAULT_QUEUE_KEY: &str = "conference:jobs";

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

fn backend(action: &str, error: &redis::RedisError) -> QueueError {
    QueueError::Backend(format!("Failed to {action}: {error}"))
}

/// Producer half: appends jobs to the list.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn_manager: ConnectionManager,
    key: String,
}

impl RedisJobQueue {
    /// Connect to `redis_url` and push to the list at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Backend`] if the connection fails.
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let conn_manager = crate::connect(redis_url)
            .await
            .map_err(|e| backend("connect to Redis", &e))?;
        Ok(Self::from_manager(conn_manager, key))
    }

    /// Share an existing connection.
    #[must_use]
    pub fn from_manager(conn_manager: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn_manager,
            key: key.into(),
        }
    }

    /// The list key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl JobQueue for RedisJobQueue {
    fn enqueue(&self, job: Job) -> QueueFuture<'_, ()> {
        Box::pin(async move {
            let payload = job.to_json()?;
            let mut conn = self.conn_manager.clone();
            let length: i64 = conn
                .rpush(&self.key, payload)
                .await
                .map_err(|e| backend("enqueue job", &e))?;

            tracing::debug!(job = job.name(), queue = %self.key, length, "Job enqueued");
            Ok(())
        })
    }
}

/// Consumer half: moves jobs from the list onto a processing list.
///
/// `BLMOVE` holds its connection while it waits, so the source owns a
/// connection of its own instead of sharing one. Each source needs its own
/// processing key; two sources sharing one would redeliver each other's jobs.
pub struct RedisJobSource {
    conn: ConnectionManager,
    key: String,
    processing_key: String,
    poll_timeout: Duration,
    in_flight: Option<String>,
}

impl RedisJobSource {
    /// Open a dedicated connection to `redis_url` and pop from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Backend`] if the connection fails.
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, QueueError> {
        let conn = crate::connect(redis_url)
            .await
            .map_err(|e| backend("connect to Redis", &e))?;
        let key = key.into();
        Ok(Self {
            conn,
            processing_key: format!("{key}:processing"),
            key,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            in_flight: None,
        })
    }

    /// Use `processing_key` instead of `<key>:processing`.
    #[must_use]
    pub fn with_processing_key(mut self, processing_key: impl Into<String>) -> Self {
        self.processing_key = processing_key.into();
        self
    }

    /// The processing list key.
    #[must_use]
    pub fn processing_key(&self) -> &str {
        &self.processing_key
    }

    /// How long a single `BLMOVE` waits before polling again.
    #[must_use]
    pub const fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

impl RedisJobSource {
    /// Drop the job handed out last from the processing list.
    async fn acknowledge(&mut self) -> Result<(), QueueError> {
        if let Some(payload) = self.in_flight.take() {
            let _: i64 = self
                .conn
                .lrem(&self.processing_key, 1, &payload)
                .await
                .map_err(|e| backend("acknowledge job", &e))?;
        }
        Ok(())
    }

    /// A job left on the processing list by an earlier run, if any.
    async fn leftover(&mut self) -> Result<Option<String>, QueueError> {
        self.conn
            .lindex(&self.processing_key, 0)
            .await
            .map_err(|e| backend("read processing list", &e))
    }

    async fn take(&mut self) -> Result<String, QueueError> {
        if let Some(payload) = self.leftover().await? {
            tracing::info!(queue = %self.key, "Redelivering unacknowledged job");
            return Ok(payload);
        }
        loop {
            let moved: Option<String> = self
                .conn
                .blmove(
                    &self.key,
                    &self.processing_key,
                    Direction::Left,
                    Direction::Right,
                    self.poll_timeout.as_secs_f64(),
                )
                .await
                .map_err(|e| backend("pop job", &e))?;

            if let Some(payload) = moved {
                return Ok(payload);
            }
        }
    }
}

impl JobSource for RedisJobSource {
    fn next_job(&mut self) -> QueueFuture<'_, Option<Job>> {
        Box::pin(async move {
            self.acknowledge().await?;
            let payload = self.take().await?;
            let job = Job::from_json(&payload);
            self.in_flight = Some(payload);
            // Undecodable payloads are acknowledged at once.
            if job.is_err() {
                self.acknowledge().await?;
            }
            job.map(Some)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::RedisCache;
    use conference_core::cache::Cache;
    use conference_core::types::ConferenceId;

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_jobs_round_trip_in_order() {
        let key = format!("conference:test:{}", ConferenceId::new());
        let queue = RedisJobQueue::new(REDIS_URL, key.clone())
            .await
            .expect("Failed to create queue");
        let mut source = RedisJobSource::new(REDIS_URL, key)
            .await
            .expect("Failed to create source")
            .with_poll_timeout(Duration::from_millis(100));

        let featured = Job::CheckFeaturedSpeakers {
            conference_id: ConferenceId::new(),
        };
        queue.enqueue(featured.clone()).await.unwrap();
        queue.enqueue(Job::RefreshAnnouncement).await.unwrap();

        assert_eq!(source.next_job().await.unwrap(), Some(featured));
        assert_eq!(source.next_job().await.unwrap(), Some(Job::RefreshAnnouncement));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_malformed_payload_is_reported() {
        let key = format!("conference:test:{}", ConferenceId::new());
        let mut conn = crate::connect(REDIS_URL).await.unwrap();
        let _: i64 = conn.rpush(&key, "not a job").await.unwrap();

        let mut source = RedisJobSource::new(REDIS_URL, key).await.unwrap();
        let err = source.next_job().await.unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));

        let processing: i64 = conn.llen(source.processing_key()).await.unwrap();
        assert_eq!(processing, 0);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_unacknowledged_job_is_redelivered() {
        let key = format!("conference:test:{}", ConferenceId::new());
        let queue = RedisJobQueue::new(REDIS_URL, key.clone()).await.unwrap();
        let featured = Job::CheckFeaturedSpeakers {
            conference_id: ConferenceId::new(),
        };
        queue.enqueue(featured.clone()).await.unwrap();

        // Stops after taking the job and before asking for another.
        let mut stopped = RedisJobSource::new(REDIS_URL, key.clone()).await.unwrap();
        assert_eq!(stopped.next_job().await.unwrap(), Some(featured.clone()));
        drop(stopped);

        let mut restarted = RedisJobSource::new(REDIS_URL, key)
            .await
            .unwrap()
            .with_poll_timeout(Duration::from_millis(100));
        assert_eq!(restarted.next_job().await.unwrap(), Some(featured));

        queue.enqueue(Job::RefreshAnnouncement).await.unwrap();
        assert_eq!(restarted.next_job().await.unwrap(), Some(Job::RefreshAnnouncement));

        let mut conn = crate::connect(REDIS_URL).await.unwrap();
        let processing: Vec<String> =
            conn.lrange(restarted.processing_key(), 0, -1).await.unwrap();
        assert_eq!(processing, [Job::RefreshAnnouncement.to_json().unwrap()]);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_cache_set_get_delete() {
        let cache = RedisCache::new(REDIS_URL).await.expect("Failed to create cache");
        let key = format!("conference:test:{}", ConferenceId::new());

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, "summary".to_string()).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("summary"));

        cache.delete(&key).await.unwrap();
        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}
