//! Generic time-boxed read-through cache.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use rollcall_core::config::cache::CacheTierConfig;
use rollcall_core::error::AppError;
use rollcall_core::result::AppResult;

/// Whether a value came from the cache or from the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Header-style label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// A moka cache whose entries become invisible once older than the
/// freshness window.
///
/// Concurrent misses on the same key are coalesced into one loader call.
/// A value whose load overlapped an invalidation is returned to its
/// callers but not kept.
#[derive(Clone)]
pub struct ReadThroughCache<K, V> {
    name: &'static str,
    inner: Cache<K, V>,
    freshness: Duration,
    /// Bumped by every invalidation.
    generation: Arc<AtomicU64>,
}

impl<K, V> fmt::Debug for ReadThroughCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("name", &self.name)
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

impl<K, V> ReadThroughCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with an explicit freshness window.
    pub fn new(name: &'static str, freshness: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(freshness)
            .build();
        Self {
            name,
            inner,
            freshness,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a cache from its configuration section.
    pub fn from_config(name: &'static str, config: &CacheTierConfig) -> Self {
        Self::new(
            name,
            Duration::from_secs(config.freshness_seconds),
            config.max_capacity,
        )
    }

    /// The freshness window.
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// A fresh cached value, if any.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Store a value, restarting its freshness window.
    pub async fn put(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Drop one entry.
    pub async fn invalidate(&self, key: &K) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(key).await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate_all();
        debug!(cache = self.name, "Cache invalidated");
    }

    /// Return the cached value for `key`, or run `loader` and cache its
    /// result. `force_refresh` discards any cached value first. Loader
    /// errors are returned and nothing is cached.
    pub async fn get_or_load<F>(
        &self,
        key: K,
        force_refresh: bool,
        loader: F,
    ) -> AppResult<(V, CacheStatus)>
    where
        F: Future<Output = AppResult<V>>,
    {
        if force_refresh {
            self.inner.invalidate(&key).await;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let entry = self
            .inner
            .entry(key.clone())
            .or_try_insert_with(loader)
            .await
            .map_err(|e: Arc<AppError>| e.as_ref().clone())?;
        let status = if entry.is_fresh() {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(cache = self.name, "Invalidated during load; value not kept");
                self.inner.invalidate(&key).await;
            }
            CacheStatus::Miss
        } else {
            CacheStatus::Hit
        };
        debug!(cache = self.name, status = status.as_str(), "Cache lookup");
        Ok((entry.into_value(), status))
    }
}
