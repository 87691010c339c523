//! [`Cache`] over `Redis` strings.

use conference_core::cache::{Cache, CacheFuture};
use conference_core::error::CacheError;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// `Redis`-backed cache.
///
/// Values are stored without expiry; every key is rewritten or deleted by the
/// job that owns it.
///
/// # Thread Safety
///
/// `Clone` is cheap: clones share the same `ConnectionManager`.
///
/// # Example
///
/// ```no_run
/// use conference_redis::RedisCache;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Backend`] if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let conn_manager = crate::connect(redis_url)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to connect to Redis: {e}")))?;
        Ok(Self::from_manager(conn_manager))
    }

    /// Share an existing connection.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

fn backend(action: &str, key: &str, error: &redis::RedisError) -> CacheError {
    metrics::counter!("conference_cache_errors_total").increment(1);
    CacheError::Backend(format!("Failed to {action} {key}: {error}"))
}

impl Cache for RedisCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            conn.get(key).await.map_err(|e| backend("get", key, &e))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let () = conn
                .set(key, value)
                .await
                .map_err(|e| backend("set", key, &e))?;
            tracing::debug!(key, "Cache entry written");
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let deleted: i64 = conn.del(key).await.map_err(|e| backend("delete", key, &e))?;
            if deleted > 0 {
                tracing::debug!(key, "Cache entry deleted");
            }
            Ok(())
        })
    }
}
