//! Backend selection and component wiring.

use crate::config::{Backend, Config};
use conference_core::cache::Cache;
use conference_core::jobs::{JobQueue, JobSource};
use conference_core::store::ConferenceStore;
use conference_postgres::PostgresStore;
use conference_redis::{RedisCache, RedisJobQueue, RedisJobSource};
use conference_runtime::{
    AnnouncementScheduler, CapacityLedger, Catalog, JobRunner, JobWorker, worker,
};
use conference_testing::{InMemoryCache, InMemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Buffer size of the in-process job queue.
const MEMORY_QUEUE_CAPACITY: usize = 1024;

/// The collaborators every component is built from.
pub struct Backends {
    /// Entity store
    pub store: Arc<dyn ConferenceStore>,
    /// Cache for published summaries
    pub cache: Arc<dyn Cache>,
    /// Producer side of the job queue
    pub queue: Arc<dyn JobQueue>,
    /// Consumer side of the job queue
    pub source: Box<dyn JobSource>,
}

impl Backends {
    /// Backends for the configured [`Backend`].
    ///
    /// # Errors
    ///
    /// Returns an error if a connection fails or migrations cannot be applied.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.backend {
            Backend::Memory => Ok(Self::in_memory(MEMORY_QUEUE_CAPACITY)),
            Backend::Postgres => Self::connect(config).await,
        }
    }

    /// Everything in process.
    #[must_use]
    pub fn in_memory(queue_capacity: usize) -> Self {
        let (queue, source) = worker::channel(queue_capacity);
        Self {
            store: Arc::new(InMemoryStore::new()),
            cache: Arc::new(InMemoryCache::new()),
            queue: Arc::new(queue),
            source: Box::new(source),
        }
    }

    /// `PostgreSQL` store with `Redis` cache and job queue.
    ///
    /// # Errors
    ///
    /// Returns an error if a connection fails or migrations cannot be applied.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let max_connections = config.postgres.max_connections;
        tracing::info!(max_connections, "Connecting to PostgreSQL...");
        let store = PostgresStore::connect(&config.postgres.url, max_connections).await?;
        store.migrate().await?;
        tracing::info!("PostgreSQL ready");

        tracing::info!(queue = %config.redis.queue_key, "Connecting to Redis...");
        let cache = RedisCache::new(&config.redis.url).await?;
        let queue = RedisJobQueue::new(&config.redis.url, config.redis.queue_key.clone()).await?;
        let source = RedisJobSource::new(&config.redis.url, config.redis.queue_key.clone()).await?;
        tracing::info!("Redis ready");

        Ok(Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
            queue: Arc::new(queue),
            source: Box::new(source),
        })
    }
}

/// The assembled application.
///
/// [`ledger`](Self::ledger) and [`catalog`](Self::catalog) are the entry
/// points for callers; the job worker and announcement scheduler run once
/// [`spawn`](Self::spawn) is called.
pub struct ConferenceApp {
    ledger: CapacityLedger,
    catalog: Catalog,
    worker: JobWorker,
    scheduler: AnnouncementScheduler,
}

impl ConferenceApp {
    /// Wire components over `backends` using the tuning in `config`.
    #[must_use]
    pub fn new(backends: Backends, config: &Config) -> Self {
        let Backends {
            store,
            cache,
            queue,
            source,
        } = backends;

        let ledger =
            CapacityLedger::new(Arc::clone(&store)).with_retry_policy(config.ledger_retry_policy());
        let catalog = Catalog::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&queue));
        let worker = JobWorker::new(JobRunner::new(store, cache), source)
            .with_retry_policy(config.job_retry_policy());
        let scheduler =
            AnnouncementScheduler::new(queue).with_interval(config.announcement_interval());

        Self {
            ledger,
            catalog,
            worker,
            scheduler,
        }
    }

    /// Registration and wishlist operations.
    #[must_use]
    pub const fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// Creation and read operations.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Start the background tasks; they stop when `shutdown` fires.
    #[must_use]
    pub fn spawn(self, shutdown: &broadcast::Sender<()>) -> Running {
        let worker = tokio::spawn(self.worker.run(shutdown.subscribe()));
        let scheduler = tokio::spawn(self.scheduler.run(shutdown.subscribe()));
        Running {
            ledger: self.ledger,
            catalog: self.catalog,
            worker,
            scheduler,
        }
    }
}

/// An application whose background tasks are running.
pub struct Running {
    /// Registration and wishlist operations
    pub ledger: CapacityLedger,
    /// Creation and read operations
    pub catalog: Catalog,
    worker: JoinHandle<usize>,
    scheduler: JoinHandle<usize>,
}

impl Running {
    /// Wait up to `timeout` for the background tasks to finish.
    ///
    /// Call after the shutdown signal has been sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a task panicked or did not finish in time.
    pub async fn join(self, timeout: Duration) -> anyhow::Result<()> {
        let both = async move { tokio::try_join!(self.worker, self.scheduler) };
        let (processed, scheduled) = tokio::time::timeout(timeout, both).await??;
        tracing::info!(processed, scheduled, "Background tasks stopped");
        Ok(())
    }
}
