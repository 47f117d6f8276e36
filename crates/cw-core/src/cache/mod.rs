//! Single-flight identity cache.
//!
//! Maps an id to an in-flight or completed fetch. When many tasks ask for the
//! same id at once, exactly one fetch runs and every caller receives its
//! outcome:
//!
//! - **Pending**: callers subscribe to the running fetch.
//! - **Resolved**: callers get the stored value without a fetch.
//! - **Failed**: the failure reaches the callers of that fetch and is then
//!   forgotten, so the next caller retries.
//!
//! The fetch runs in its own task. A caller that gives up (its future is
//! dropped) never cancels a fetch other callers still wait on. The internal
//! lock only guards bookkeeping and is never held across the fetch itself.
//!
//! Resolved entries live in a `moka` store that may evict them; the cache is
//! a round-trip saver, not a source of truth.

mod types;

pub use types::{CacheOptions, CacheStats};

use crate::error::{CatalogError, CatalogResult};
use crate::metrics;
use moka::future::Cache as MokaCache;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

type FlightOutcome<V> = Option<CatalogResult<V>>;

struct Flight<V> {
    generation: u64,
    receiver: watch::Receiver<FlightOutcome<V>>,
}

struct Inner<V> {
    resolved: MokaCache<String, V>,
    pending: Mutex<HashMap<String, Flight<V>>>,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> Inner<V> {
    /// Publishes a finished fetch, unless the entry was invalidated or
    /// superseded while the fetch was running.
    async fn complete(&self, id: &str, generation: u64, outcome: &CatalogResult<V>) {
        let mut pending = self.pending.lock().await;
        let current = pending.get(id).map(|f| f.generation) == Some(generation);
        if !current {
            debug!(id, "Discarding result of superseded fetch");
            return;
        }
        if let Ok(value) = outcome {
            self.resolved.insert(id.to_string(), value.clone()).await;
        }
        pending.remove(id);
    }

    async fn abandon(&self, id: &str, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending.get(id).map(|f| f.generation) == Some(generation) {
            pending.remove(id);
        }
    }
}

/// Process-scoped map from id to in-flight-or-completed fetch result.
pub struct IdentityCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for IdentityCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> IdentityCache<V> {
    pub fn new(options: CacheOptions) -> Self {
        let mut builder = MokaCache::builder();
        if let Some(capacity) = options.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = options.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        Self {
            inner: Arc::new(Inner {
                resolved: builder.build(),
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                joined: AtomicU64::new(0),
            }),
        }
    }

    /// A cache whose resolved entries are never evicted.
    pub fn unbounded() -> Self {
        Self::new(CacheOptions::unbounded())
    }

    /// Returns the value for `id`, running `fetch` only if no resolved entry
    /// or in-flight fetch exists.
    ///
    /// `fetch` is invoked at most once per call and only by the caller that
    /// starts a flight.
    pub async fn get_or_fetch<F, Fut>(&self, id: &str, fetch: F) -> CatalogResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CatalogResult<V>> + Send + 'static,
    {
        let (generation, mut receiver) = {
            let mut pending = self.inner.pending.lock().await;

            if let Some(value) = self.inner.resolved.get(id).await {
                self.inner.hits.fetch_add(1, Ordering::SeqCst);
                metrics::record_cache_hit();
                return Ok(value);
            }

            match pending.get(id) {
                Some(flight) => {
                    self.inner.joined.fetch_add(1, Ordering::SeqCst);
                    metrics::record_cache_hit();
                    debug!(id, "Joining in-flight fetch");
                    (flight.generation, flight.receiver.clone())
                }
                None => {
                    self.inner.misses.fetch_add(1, Ordering::SeqCst);
                    metrics::record_cache_miss();

                    let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
                    let (sender, receiver) = watch::channel(None);
                    pending.insert(
                        id.to_string(),
                        Flight {
                            generation,
                            receiver: receiver.clone(),
                        },
                    );

                    let inner = Arc::clone(&self.inner);
                    let key = id.to_string();
                    let task = fetch();
                    tokio::spawn(async move {
                        let outcome = task.await;
                        inner.complete(&key, generation, &outcome).await;
                        // Nobody left waiting is fine; the value is already stored.
                        let _ = sender.send(Some(outcome));
                    });

                    (generation, receiver)
                }
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!(id, "Fetch task ended without publishing a result");
                self.inner.abandon(id, generation).await;
                Err(CatalogError::Internal(format!(
                    "fetch for '{}' ended without a result",
                    id
                )))
            }
        }
    }

    /// Returns a resolved value without fetching.
    pub async fn get(&self, id: &str) -> Option<V> {
        self.inner.resolved.get(id).await
    }

    /// Stores a value directly, replacing any resolved entry and detaching
    /// any in-flight fetch for `id` (its callers still receive its result).
    pub async fn insert(&self, id: &str, value: V) {
        let mut pending = self.inner.pending.lock().await;
        pending.remove(id);
        self.inner.resolved.insert(id.to_string(), value).await;
    }

    /// Removes any entry for `id`, forcing the next access to fetch again.
    ///
    /// A fetch already in flight still completes for its waiters, but its
    /// result is not stored. Returns true if anything was removed.
    pub async fn invalidate(&self, id: &str) -> bool {
        let mut pending = self.inner.pending.lock().await;
        let had_flight = pending.remove(id).is_some();
        let had_value = self.inner.resolved.remove(id).await.is_some();
        had_flight || had_value
    }

    /// Removes every entry.
    pub async fn invalidate_all(&self) {
        let mut pending = self.inner.pending.lock().await;
        pending.clear();
        self.inner.resolved.invalidate_all();
        self.inner.resolved.run_pending_tasks().await;
    }

    /// Ids of all resolved entries currently held.
    pub fn resolved_ids(&self) -> Vec<String> {
        self.inner
            .resolved
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::SeqCst),
            misses: self.inner.misses.load(Ordering::SeqCst),
            joined: self.inner.joined.load(Ordering::SeqCst),
            size: self.inner.resolved.entry_count(),
        }
    }
}
