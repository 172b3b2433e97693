//! Keyed cache of GraphQL results with request de-duplication.
//!
//! Each key maps to `{value, timestamp, in-flight future}`. While a request
//! for a key is in flight, every other caller for that key awaits the same
//! shared future instead of issuing a second request. Results are applied in
//! completion order (last applied wins). A failed request never clears the
//! value already held for its key.

use crate::error::QueryError;
use crate::graphql::{GraphQlRequest, Transport};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub type FetchResult = Result<Arc<Value>, QueryError>;
type InFlight = Shared<BoxFuture<'static, FetchResult>>;

/// Upper bound for a single retry back-off.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Ordered list of tokens identifying one logical query and its variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && prefix.iter().zip(&self.0).all(|(p, k)| p == k)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// How many times a failed request is re-attempted, and how long to wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): `delay * 2^(attempt-1)`,
    /// capped, plus up to a quarter of the base delay as jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.delay.saturating_mul(1u32 << exp).min(MAX_RETRY_DELAY);
        let jitter_max = (self.delay.as_millis() / 4) as u64;
        let jitter = if jitter_max > 0 {
            rand::thread_rng().gen_range(0..=jitter_max)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Default)]
struct Entry {
    data: Option<Arc<Value>>,
    error: Option<QueryError>,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    invalidated: bool,
    in_flight: Option<(u64, InFlight)>,
    subscribers: usize,
    touched_at: Option<Instant>,
}

impl Entry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self.data.is_some()
            && self
                .fetched_at
                .map(|t| t.elapsed() < stale_time)
                .unwrap_or(false)
    }
}

/// Point-in-time view of one cache entry.
#[derive(Clone, Debug, Default)]
pub struct CacheSnapshot {
    pub data: Option<Arc<Value>>,
    pub error: Option<QueryError>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_fetching: bool,
}

struct CacheInner {
    transport: Arc<dyn Transport>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_request_id: AtomicU64,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, key: &QueryKey, request_id: u64, result: &FetchResult) {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        match result {
            Ok(value) => {
                entry.data = Some(Arc::clone(value));
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
                entry.updated_at = Some(Utc::now());
                entry.invalidated = false;
            }
            Err(e) => {
                log::warn!("query {key} failed: {e}");
                entry.error = Some(e.clone());
            }
        }
        if matches!(entry.in_flight, Some((id, _)) if id == request_id) {
            entry.in_flight = None;
        }
        entry.touched_at = Some(Instant::now());
    }
}

/// Shared handle to the query cache. Clones refer to the same cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl QueryCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                transport,
                entries: Mutex::new(HashMap::new()),
                next_request_id: AtomicU64::new(1),
            }),
        }
    }

    /// Serve a fresh cached value, or fetch one.
    pub async fn read(
        &self,
        key: &QueryKey,
        request: &GraphQlRequest,
        stale_time: Duration,
        retry: RetryPolicy,
    ) -> FetchResult {
        if let Some(value) = self.fresh(key, stale_time) {
            log::trace!("cache hit {key}");
            return Ok(value);
        }
        self.fetch(key, request, retry).await
    }

    /// Fetch regardless of staleness, joining any request already in flight.
    pub async fn fetch(
        &self,
        key: &QueryKey,
        request: &GraphQlRequest,
        retry: RetryPolicy,
    ) -> FetchResult {
        self.start_fetch(key, request, retry).await
    }

    fn start_fetch(&self, key: &QueryKey, request: &GraphQlRequest, retry: RetryPolicy) -> InFlight {
        let mut entries = self.inner.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.touched_at = Some(Instant::now());
        if let Some((_, pending)) = &entry.in_flight {
            log::trace!("joining in-flight request for {key}");
            return pending.clone();
        }

        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let owned_request = request.clone();
        let pending = async move {
            let result = execute_with_retry(inner.transport.as_ref(), &owned_request, retry).await;
            inner.apply(&owned_key, request_id, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some((request_id, pending.clone()));
        drop(entries);

        log::debug!("fetch {key} (request #{request_id})");
        // Runs to completion even if every caller stops awaiting it.
        tokio::spawn(pending.clone());
        pending
    }

    fn fresh(&self, key: &QueryKey, stale_time: Duration) -> Option<Arc<Value>> {
        let mut entries = self.inner.lock();
        let entry = entries.get_mut(key)?;
        if entry.is_fresh(stale_time) {
            entry.touched_at = Some(Instant::now());
            entry.data.clone()
        } else {
            None
        }
    }

    pub fn snapshot(&self, key: &QueryKey) -> CacheSnapshot {
        let entries = self.inner.lock();
        match entries.get(key) {
            Some(e) => CacheSnapshot {
                data: e.data.clone(),
                error: e.error.clone(),
                updated_at: e.updated_at,
                is_fetching: e.in_flight.is_some(),
            },
            None => CacheSnapshot::default(),
        }
    }

    pub fn subscribe(&self, key: &QueryKey) {
        let mut entries = self.inner.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.subscribers += 1;
        entry.touched_at = Some(Instant::now());
    }

    pub fn unsubscribe(&self, key: &QueryKey) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            entry.touched_at = Some(Instant::now());
        }
    }

    pub fn subscribers(&self, key: &QueryKey) -> usize {
        self.inner.lock().get(key).map(|e| e.subscribers).unwrap_or(0)
    }

    /// Mark every entry whose key starts with `prefix` as stale.
    pub fn invalidate(&self, prefix: &[&str]) -> usize {
        let mut entries = self.inner.lock();
        let mut n = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                n += 1;
            }
        }
        n
    }

    /// Drop unobserved, idle entries untouched for longer than `max_idle`.
    pub fn collect_garbage(&self, max_idle: Duration) -> usize {
        let mut entries = self.inner.lock();
        let before = entries.len();
        entries.retain(|_, e| {
            e.subscribers > 0
                || e.in_flight.is_some()
                || e.touched_at.map(|t| t.elapsed() <= max_idle).unwrap_or(false)
        });
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("cache gc removed {removed} entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn execute_with_retry(
    transport: &dyn Transport,
    request: &GraphQlRequest,
    retry: RetryPolicy,
) -> FetchResult {
    let mut attempt = 0u32;
    loop {
        match transport.execute(request).await {
            Ok(value) => return Ok(Arc::new(value)),
            Err(e) if attempt < retry.attempts => {
                attempt += 1;
                let wait = retry.backoff(attempt);
                log::warn!(
                    "{} failed ({e}), retry {attempt}/{} in {}ms",
                    request.operation_name,
                    retry.attempts,
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        fail_first: usize,
        delay: Duration,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn execute(&self, _request: &GraphQlRequest) -> Result<Value, QueryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.fail_first {
                Err(QueryError::Http(503))
            } else {
                Ok(json!({ "n": n }))
            }
        }
    }

    fn cache(fail_first: usize, delay_ms: u64) -> (QueryCache, Arc<Counting>) {
        let t = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail_first,
            delay: Duration::from_millis(delay_ms),
        });
        (QueryCache::new(t.clone()), t)
    }

    fn key() -> QueryKey {
        QueryKey::new(["node", "info"])
    }

    #[test]
    fn key_display_and_prefix() {
        let k = QueryKey::new(["blocks", "recent", "3"]);
        assert_eq!(k.to_string(), "[blocks, recent, 3]");
        assert!(k.starts_with(&["blocks"]));
        assert!(k.starts_with(&["blocks", "recent"]));
        assert!(!k.starts_with(&["transactions"]));
        assert!(!QueryKey::new(["blocks"]).starts_with(&["blocks", "recent"]));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(100),
        };
        let first = p.backoff(1);
        let third = p.backoff(3);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(425));
        let big = RetryPolicy {
            attempts: 20,
            delay: Duration::from_secs(10),
        };
        assert!(big.backoff(10) <= MAX_RETRY_DELAY + Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let (cache, t) = cache(0, 50);
        let req = GraphQlRequest::node_info();
        let k = key();
        let (a, b) = tokio::join!(
            cache.fetch(&k, &req, RetryPolicy::none()),
            cache.fetch(&k, &req, RetryPolicy::none())
        );
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_a_request() {
        let (cache, t) = cache(0, 0);
        let req = GraphQlRequest::node_info();
        let k = key();
        let stale = Duration::from_secs(60);
        let first = cache.read(&k, &req, stale, RetryPolicy::none()).await.unwrap();
        let second = cache.read(&k, &req, stale, RetryPolicy::none()).await.unwrap();
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn zero_stale_time_always_refetches() {
        let (cache, t) = cache(0, 0);
        let req = GraphQlRequest::node_info();
        let k = key();
        cache.read(&k, &req, Duration::ZERO, RetryPolicy::none()).await.unwrap();
        cache.read(&k, &req, Duration::ZERO, RetryPolicy::none()).await.unwrap();
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_recovers_within_one_fetch() {
        let (cache, t) = cache(2, 0);
        let retry = RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        };
        let v = cache.fetch(&key(), &GraphQlRequest::node_info(), retry).await.unwrap();
        assert_eq!(*v, json!({"n": 2}));
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_keeps_previous_data() {
        let (cache, _t) = cache(0, 0);
        let k = key();
        let req = GraphQlRequest::node_info();
        cache.fetch(&k, &req, RetryPolicy::none()).await.unwrap();

        // A later completion for the same key that failed.
        cache.inner.apply(&k, 0, &Err(QueryError::Http(500)));

        let snap = cache.snapshot(&k);
        assert_eq!(snap.data.as_deref(), Some(&json!({"n": 0})));
        assert_eq!(snap.error, Some(QueryError::Http(500)));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (cache, t) = cache(0, 0);
        let k = QueryKey::new(["blocks", "recent", "1"]);
        let req = GraphQlRequest::recent_blocks(10, 0);
        let stale = Duration::from_secs(60);
        cache.read(&k, &req, stale, RetryPolicy::none()).await.unwrap();
        assert_eq!(cache.invalidate(&["blocks"]), 1);
        cache.read(&k, &req, stale, RetryPolicy::none()).await.unwrap();
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn garbage_collection_spares_subscribed_entries() {
        let (cache, _t) = cache(0, 0);
        let kept = QueryKey::new(["kept"]);
        let dropped = QueryKey::new(["dropped"]);
        let req = GraphQlRequest::node_info();
        cache.subscribe(&kept);
        cache.fetch(&kept, &req, RetryPolicy::none()).await.unwrap();
        cache.fetch(&dropped, &req, RetryPolicy::none()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.collect_garbage(Duration::ZERO), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.snapshot(&kept).data.is_some());
    }
}
