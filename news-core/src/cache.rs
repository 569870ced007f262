use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ApiError, CacheError};
use crate::model::now_ms;
use crate::store::{LocalStore, StoredEntry};

/// Well-known partitions for the reference datasets the UI consumes.
pub mod partitions {
    pub const TOKENS: &str = "tokens";
    pub const TOP_LISTINGS: &str = "top_listings";
    pub const CRYPTO_MARKET: &str = "crypto_market";
}

/// What `read` hands back for a partition. Absence is a valid value: an
/// empty payload with a zero timestamp means "never fetched".
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub fetched_at: i64,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            payload: serde_json::Value::Array(Vec::new()),
            fetched_at: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fetched_at == 0
    }
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Stale-while-revalidate cache for slow-changing reference datasets
/// (token lists, market listings).
///
/// Reads are served from the injected [`LocalStore`] immediately; a stale
/// entry additionally kicks off a background refresh that overwrites the
/// partition for the next read. Store failures never reach the caller:
/// a failed read acts like a miss, a failed write leaves the session value
/// intact.
#[derive(Clone)]
pub struct ReferenceCache {
    store: Arc<dyn LocalStore>,
    revalidating: Arc<Mutex<HashSet<String>>>,
    clock: Clock,
}

impl ReferenceCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self::with_clock(store, Arc::new(now_ms))
    }

    /// Cache with an injected clock. Tests use this to pin the staleness
    /// boundary exactly.
    pub fn with_clock(store: Arc<dyn LocalStore>, clock: Clock) -> Self {
        Self {
            store,
            revalidating: Arc::new(Mutex::new(HashSet::new())),
            clock,
        }
    }

    /// Last persisted entry for the partition. Never fails; a store error
    /// or a missing partition both read as the empty entry.
    pub async fn read(&self, partition: &str) -> CacheEntry {
        match self.store.get(partition).await {
            Ok(Some(entry)) => CacheEntry {
                payload: entry.payload,
                fetched_at: entry.fetched_at,
            },
            Ok(None) => CacheEntry::empty(),
            Err(err) => {
                warn!(error = %err, partition, "store read failed, treating as empty");
                CacheEntry::empty()
            }
        }
    }

    /// Wholesale overwrite of a partition's payload and timestamp.
    /// Reference datasets are always replaced, never merged item-wise.
    pub async fn write<T: Serialize>(&self, partition: &str, payload: &[T]) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, partition, "failed to serialize payload, skipping persist");
                return;
            }
        };
        self.persist(partition, value).await;
    }

    /// Serve the partition with stale-while-revalidate semantics.
    ///
    /// - never fetched: await `fetcher`, persist, return (fetcher failure
    ///   surfaces as [`CacheError::FetchFailed`]);
    /// - fresh (`elapsed <= max_age`, ties count as fresh): cached payload,
    ///   no fetch;
    /// - stale: cached payload immediately, refresh in the background; a
    ///   background failure leaves the stale entry untouched.
    pub async fn get_fresh<T, F, Fut>(
        &self,
        partition: &str,
        max_age: Duration,
        fetcher: F,
    ) -> Result<Vec<T>, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
    {
        let entry = self.read(partition).await;

        let cached: Option<Vec<T>> = if entry.is_empty() {
            None
        } else {
            match serde_json::from_value(entry.payload.clone()) {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!(error = %err, partition, "cached payload no longer decodes, refetching");
                    None
                }
            }
        };

        let cached = match cached {
            Some(cached) => cached,
            None => {
                let fresh = fetcher().await.map_err(CacheError::FetchFailed)?;
                self.write(partition, &fresh).await;
                return Ok(fresh);
            }
        };

        let elapsed = (self.clock)() - entry.fetched_at;
        if elapsed <= max_age.as_millis() as i64 {
            return Ok(cached);
        }

        self.spawn_revalidation(partition, fetcher);
        Ok(cached)
    }

    /// Start a background refresh unless one is already in flight for the
    /// partition. Duplicate concurrent fetches are wasteful, so they are
    /// collapsed best-effort.
    fn spawn_revalidation<T, F, Fut>(&self, partition: &str, fetcher: F)
    where
        T: Serialize + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, ApiError>> + Send + 'static,
    {
        {
            let mut in_flight = self.revalidating.lock().expect("revalidation set poisoned");
            if !in_flight.insert(partition.to_owned()) {
                debug!(partition, "revalidation already in flight, skipping");
                return;
            }
        }

        let cache = self.clone();
        let partition = partition.to_owned();
        tokio::spawn(async move {
            match fetcher().await {
                Ok(fresh) => cache.write(&partition, &fresh).await,
                Err(err) => {
                    warn!(error = %err, partition = %partition, "background refresh failed, keeping stale entry");
                }
            }
            cache
                .revalidating
                .lock()
                .expect("revalidation set poisoned")
                .remove(&partition);
        });
    }

    async fn persist(&self, partition: &str, payload: serde_json::Value) {
        let entry = StoredEntry {
            payload,
            fetched_at: (self.clock)(),
        };
        if let Err(err) = self.store.put(partition, entry).await {
            warn!(error = %err, partition, "store write failed, value kept in session only");
        }
    }
}
