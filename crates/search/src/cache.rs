//! Content-addressed query cache with single-flight fetches
//!
//! Keys are hashes of (normalized keyword, search type). Entries carry a
//! TTL suited to slowly-changing registry data and the map is capacity
//! bounded with least-recently-used eviction. At most one producer runs
//! per key: concurrent callers for a key in flight await that one
//! outcome instead of issuing their own upstream calls. The producer is
//! spawned on the runtime so a cancelled request does not abort the fetch
//! for other waiters. Failed fetches are never cached; partial successes
//! are.

use medsearch_common::{
    errors::Result,
    metrics,
    models::{SearchResult, SearchType},
    AppError,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, Instant};

/// Cache key: hex-encoded hash of (search type, case-folded keyword)
pub type CacheKey = String;

/// Build the cache key for a query
///
/// The keyword is case-folded for keying only; display casing is
/// preserved in the records themselves.
pub fn cache_key(keyword: &str, search_type: SearchType) -> CacheKey {
    let normalized = keyword.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(search_type.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Query cache tuning
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Entry time-to-live
    pub ttl: Duration,
    /// Maximum number of entries before LRU eviction
    pub capacity: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            capacity: 500,
        }
    }
}

struct Entry {
    value: SearchResult,
    expires_at: Instant,
    last_used: u64,
}

struct Store {
    entries: HashMap<CacheKey, Entry>,
    /// Monotonic access counter backing the LRU order
    tick: u64,
}

/// Outcome shared between single-flight waiters; the error side carries
/// only the message so it can be cloned per waiter.
type SharedOutcome = std::result::Result<SearchResult, String>;

/// In-memory search result cache
///
/// State lives behind an inner `Arc` so producer tasks can outlive the
/// request that spawned them. Both maps are guarded by async mutexes and
/// never locked simultaneously.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: Mutex<Store>,
    inflight: Mutex<HashMap<CacheKey, watch::Receiver<Option<SharedOutcome>>>>,
    ttl: Duration,
    capacity: usize,
}

impl QueryCache {
    /// Create a new cache
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store: Mutex::new(Store {
                    entries: HashMap::new(),
                    tick: 0,
                }),
                inflight: Mutex::new(HashMap::new()),
                ttl: config.ttl,
                capacity: config.capacity.max(1),
            }),
        }
    }

    /// Get the cached result for `key`, or run `producer` to fetch it
    ///
    /// Guarantees at most one concurrent producer per key. Every waiter
    /// observes the same outcome, including failure; a failed fetch
    /// leaves the key cold so the next request retries upstream.
    pub async fn get_or_fetch<F>(&self, key: CacheKey, producer: F) -> Result<SearchResult>
    where
        F: Future<Output = Result<SearchResult>> + Send + 'static,
    {
        if let Some(hit) = self.lookup(&key).await {
            metrics::record_cache(true);
            return Ok(hit);
        }
        metrics::record_cache(false);

        let mut rx = {
            let mut inflight = self.inner.inflight.lock().await;
            match inflight.get(&key) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), rx.clone());

                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        let shared: SharedOutcome = match producer.await {
                            Ok(result) => {
                                inner.insert(key.clone(), result.clone()).await;
                                Ok(result)
                            }
                            Err(AppError::SearchFailed { message }) => Err(message),
                            Err(e) => Err(e.to_string()),
                        };
                        inner.inflight.lock().await.remove(&key);
                        // Waiters may all have gone away; that is fine.
                        let _ = tx.send(Some(shared));
                    });

                    rx
                }
            }
        };

        let outcome = match rx.wait_for(|v| v.is_some()).await {
            Ok(value) => value.clone(),
            Err(_) => {
                return Err(AppError::Internal {
                    message: "Search fetch task aborted".to_string(),
                })
            }
        };

        match outcome {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(AppError::SearchFailed { message }),
            None => Err(AppError::Internal {
                message: "Search fetch produced no outcome".to_string(),
            }),
        }
    }

    /// Number of live entries (readiness reporting)
    pub async fn len(&self) -> usize {
        self.inner.store.lock().await.entries.len()
    }

    async fn lookup(&self, key: &CacheKey) -> Option<SearchResult> {
        let mut store = self.inner.store.lock().await;
        store.tick += 1;
        let tick = store.tick;
        let now = Instant::now();

        match store.entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_used = tick;
                Some(entry.value.clone())
            }
            Some(_) => {
                store.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl CacheInner {
    async fn insert(&self, key: CacheKey, value: SearchResult) {
        let mut store = self.store.lock().await;
        store.tick += 1;
        let tick = store.tick;
        let now = Instant::now();

        if !store.entries.contains_key(&key) && store.entries.len() >= self.capacity {
            // Reap expired entries before evicting anything live.
            store.entries.retain(|_, e| e.expires_at > now);

            if store.entries.len() >= self.capacity {
                let lru = store
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                if let Some(lru) = lru {
                    store.entries.remove(&lru);
                    metrics::record_cache_eviction();
                }
            }
        }

        store.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                last_used: tick,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_result() -> SearchResult {
        SearchResult {
            trials: Vec::new(),
            drugs: Vec::new(),
            fetched_at: Utc::now(),
            partial: false,
            errors: Vec::new(),
        }
    }

    fn cache_with(ttl_secs: u64, capacity: usize) -> Arc<QueryCache> {
        Arc::new(QueryCache::new(QueryCacheConfig {
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        }))
    }

    #[test]
    fn test_cache_key_case_folds_and_trims() {
        assert_eq!(
            cache_key("  Diabetes ", SearchType::Both),
            cache_key("diabetes", SearchType::Both)
        );
        assert_ne!(
            cache_key("diabetes", SearchType::Both),
            cache_key("diabetes", SearchType::Fda)
        );
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let cache = cache_with(600, 10);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let result = cache
                .get_or_fetch("k1".to_string(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await
                .unwrap();
            assert!(!result.partial);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache_with(600, 10);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            cache
                .get_or_fetch("k1".to_string(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await
                .unwrap();
            tokio::time::advance(Duration::from_secs(601)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = cache_with(600, 2);

        for key in ["a", "b"] {
            cache
                .get_or_fetch(key.to_string(), async { Ok(empty_result()) })
                .await
                .unwrap();
        }

        // Touch "a" so "b" becomes least recently used.
        let touched = Arc::new(AtomicUsize::new(0));
        {
            let touched = touched.clone();
            cache
                .get_or_fetch("a".to_string(), async move {
                    touched.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await
                .unwrap();
        }
        assert_eq!(touched.load(Ordering::SeqCst), 0);

        cache
            .get_or_fetch("c".to_string(), async { Ok(empty_result()) })
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        // "a" survived the eviction.
        let a_again = Arc::new(AtomicUsize::new(0));
        {
            let a_again = a_again.clone();
            cache
                .get_or_fetch("a".to_string(), async move {
                    a_again.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await
                .unwrap();
        }
        assert_eq!(a_again.load(Ordering::SeqCst), 0);

        // "b" was evicted; fetching it again runs the producer.
        let refetched = Arc::new(AtomicUsize::new(0));
        {
            let refetched = refetched.clone();
            cache
                .get_or_fetch("b".to_string(), async move {
                    refetched.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await
                .unwrap();
        }
        assert_eq!(refetched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_flight_dedupes_concurrent_fetches() {
        let cache = cache_with(600, 10);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("hot".to_string(), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(empty_result())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_failure() {
        let cache = cache_with(600, 10);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("down".to_string(), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(AppError::SearchFailed {
                            message: "all providers failed".to_string(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Err(AppError::SearchFailed { message }) => {
                    assert_eq!(message, "all providers failed");
                }
                other => panic!("expected SearchFailed, got {:?}", other.is_ok()),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_not_cached() {
        let cache = cache_with(600, 10);
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let calls = calls.clone();
            let result = cache
                .get_or_fetch("flaky".to_string(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::SearchFailed {
                        message: "boom".to_string(),
                    })
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(cache.len().await, 0);

        {
            let calls = calls.clone();
            let result = cache
                .get_or_fetch("flaky".to_string(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(empty_result())
                })
                .await;
            assert!(result.is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
