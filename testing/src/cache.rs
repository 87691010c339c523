//! In-memory [`Cache`].

use conference_core::cache::{Cache, CacheFuture};
use conference_core::error::CacheError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// HashMap-backed cache with failure injection.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
    injected_failures: Arc<AtomicU32>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` cache calls fail.
    pub fn fail_next_calls(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Read a value without going through the async API.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn check_injected_failure(&self) -> Result<(), CacheError> {
        match self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(_) => Err(CacheError::Backend("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

impl Cache for InMemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
        Box::pin(async move {
            self.check_injected_failure()?;
            Ok(self.value(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.check_injected_failure()?;
            self.entries.write().unwrap().insert(key.to_string(), value);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
        Box::pin(async move {
            self.check_injected_failure()?;
            self.entries.write().unwrap().remove(key);
            Ok(())
        })
    }
}
