//! `Redis` backends for the conference core.
//!
//! - [`RedisCache`]: the [`Cache`] holding featured-speaker summaries and the
//!   announcement, as plain string keys
//! - [`RedisJobQueue`] / [`RedisJobSource`]: a durable job list (`RPUSH` to
//!   enqueue, `BLMOVE` onto a processing list to consume) carrying JSON-encoded jobs
//!
//! All types share connections through `ConnectionManager`, except
//! [`RedisJobSource`], which blocks and therefore owns a dedicated one.
//!
//! [`Cache`]: conference_core::cache::Cache

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod queue;

pub use cache::RedisCache;
pub use queue::{DEFAULT_QUEUE_KEY, RedisJobQueue, RedisJobSource};

use redis::Client;
use redis::aio::ConnectionManager;

/// Open a managed connection to `redis_url`.
///
/// # Connection URL Format
///
/// - TCP: `redis://[:password@]host[:port][/database]`
/// - TLS: `rediss://[:password@]host[:port][/database]`
///
/// # Errors
///
/// Returns the `redis` error if the URL is malformed or the server cannot be
/// reached.
pub async fn connect(redis_url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    tracing::info!("Connected to Redis");
    Ok(manager)
}
