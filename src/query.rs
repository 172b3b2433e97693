//! Live query observers.
//!
//! A `QueryHandle<T>` owns a background task that reads its key through the
//! `QueryCache`, decodes the result into `T`, and publishes `QueryState<T>`
//! snapshots. With a refetch interval it keeps polling for as long as the
//! handle lives. Dropping the handle stops all state updates; a request
//! already in flight still completes into the cache.

use crate::error::QueryError;
use crate::graphql::GraphQlRequest;
use crate::query_cache::{FetchResult, QueryCache, QueryKey, RetryPolicy};
use crate::types::AppEvent;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// Disabled: nothing requested, nothing failed.
    Idle,
    /// Enabled, no terminal result yet.
    Loading,
    Success,
    Error,
}

/// The `{data, isLoading, error}` envelope seen by views.
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<QueryError>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    /// `data` belongs to the previous key and is shown while this one loads.
    pub is_placeholder: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_fetching: self.is_fetching,
            is_placeholder: self.is_placeholder,
        }
    }
}

impl<T> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("is_fetching", &self.is_fetching)
            .field("is_placeholder", &self.is_placeholder)
            .finish()
    }
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            is_fetching: false,
            is_placeholder: false,
        }
    }

    pub fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            ..Self::idle()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    /// What a list view should draw: loading wins over error, error over
    /// empty. An idle query draws as empty.
    pub fn body<'a, R, F>(&'a self, rows: F) -> ListBody<'a, R>
    where
        F: FnOnce(&'a T) -> &'a [R],
    {
        match self.status {
            QueryStatus::Loading => ListBody::Loading,
            QueryStatus::Error => ListBody::Error,
            QueryStatus::Idle => ListBody::Empty,
            QueryStatus::Success => match self.data.as_deref().map(rows) {
                Some(r) if !r.is_empty() => ListBody::Rows(r),
                _ => ListBody::Empty,
            },
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ListBody<'a, R> {
    Loading,
    Error,
    Empty,
    Rows(&'a [R]),
}

/// Per-observer configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryOptions {
    pub enabled: bool,
    pub stale_time: Duration,
    pub refetch_interval: Option<Duration>,
    pub refetch_in_background: bool,
    pub retry: RetryPolicy,
    pub keep_previous_data: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: Duration::from_millis(5000),
            refetch_interval: None,
            refetch_in_background: false,
            retry: RetryPolicy::default(),
            keep_previous_data: false,
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, d: Duration) -> Self {
        self.stale_time = d;
        self
    }

    pub fn refetch_interval(mut self, d: Duration) -> Self {
        self.refetch_interval = Some(d);
        self
    }

    pub fn refetch_in_background(mut self, on: bool) -> Self {
        self.refetch_in_background = on;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn keep_previous_data(mut self, on: bool) -> Self {
        self.keep_previous_data = on;
        self
    }
}

/// A mounted query. Dropping it unmounts the observer.
pub struct QueryHandle<T> {
    key: QueryKey,
    options: QueryOptions,
    cache: QueryCache,
    notify: Option<UnboundedSender<AppEvent>>,
    state: watch::Receiver<QueryState<T>>,
    visible: watch::Sender<bool>,
    refetch: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T> QueryHandle<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Mount an observer for `key`. Must be called inside a tokio runtime.
    pub fn spawn(
        cache: &QueryCache,
        key: QueryKey,
        request: GraphQlRequest,
        options: QueryOptions,
        notify: Option<UnboundedSender<AppEvent>>,
    ) -> Self {
        Self::spawn_with(cache, key, request, options, notify, None)
    }

    fn spawn_with(
        cache: &QueryCache,
        key: QueryKey,
        request: GraphQlRequest,
        options: QueryOptions,
        notify: Option<UnboundedSender<AppEvent>>,
        placeholder: Option<Arc<T>>,
    ) -> Self {
        let initial = if !options.enabled {
            QueryState::idle()
        } else {
            let mut s = QueryState::loading();
            if let Some(prev) = placeholder {
                s.status = QueryStatus::Success;
                s.data = Some(prev);
                s.is_placeholder = true;
                s.is_fetching = true;
            }
            s
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (visible_tx, visible_rx) = watch::channel(true);
        let refetch = Arc::new(Notify::new());

        cache.subscribe(&key);
        let task = tokio::spawn(observe(
            cache.clone(),
            key.clone(),
            request,
            options,
            state_tx,
            visible_rx,
            Arc::clone(&refetch),
            notify.clone(),
        ));

        Self {
            key,
            options,
            cache: cache.clone(),
            notify,
            state: state_rx,
            visible: visible_tx,
            refetch,
            task,
        }
    }

    /// Mount the same query under a new key and variables, carrying the
    /// current data over as a placeholder when `keep_previous_data` is set.
    pub fn respawn(&self, key: QueryKey, request: GraphQlRequest) -> Self {
        let placeholder = if self.options.keep_previous_data {
            self.state.borrow().data.clone()
        } else {
            None
        };
        Self::spawn_with(
            &self.cache,
            key,
            request,
            self.options,
            self.notify.clone(),
            placeholder,
        )
    }

    /// Wait until the published state satisfies `pred`. Returns `None` if the
    /// observer finished without ever satisfying it.
    pub async fn wait_for<F>(&mut self, pred: F) -> Option<QueryState<T>>
    where
        F: FnMut(&QueryState<T>) -> bool,
    {
        self.state.wait_for(pred).await.ok().map(|s| s.clone())
    }
}

impl<T> QueryHandle<T> {
    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Visibility gates polling unless background refetching is enabled.
    pub fn set_visible(&self, visible: bool) {
        self.visible.send_replace(visible);
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Fetch now, ignoring staleness and visibility, even while a hidden
    /// handle is waiting to be shown. Coalesces with a pending request for
    /// the same key.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
        self.cache.unsubscribe(&self.key);
    }
}

async fn observe<T>(
    cache: QueryCache,
    key: QueryKey,
    request: GraphQlRequest,
    options: QueryOptions,
    state: watch::Sender<QueryState<T>>,
    mut visible: watch::Receiver<bool>,
    refetch: Arc<Notify>,
    notify: Option<UnboundedSender<AppEvent>>,
) where
    T: DeserializeOwned + Send + Sync + 'static,
{
    if !options.enabled {
        return;
    }

    let publish = |state: &watch::Sender<QueryState<T>>, f: &dyn Fn(&mut QueryState<T>)| {
        state.send_modify(|s| f(s));
        if let Some(tx) = &notify {
            let _ = tx.send(AppEvent::QueryUpdated(key.clone()));
        }
    };

    // Serve whatever the cache already holds (possibly stale) before fetching.
    let snap = cache.snapshot(&key);
    if let Some(value) = snap.data {
        if let Ok(data) = T::deserialize(&*value) {
            let data = Arc::new(data);
            publish(&state, &|s: &mut QueryState<T>| {
                s.status = QueryStatus::Success;
                s.data = Some(Arc::clone(&data));
                s.updated_at = snap.updated_at;
                s.is_placeholder = false;
                s.is_fetching = true;
            });
        }
    }

    let result = cache
        .read(&key, &request, options.stale_time, options.retry)
        .await;
    let updated_at = cache.snapshot(&key).updated_at;
    publish(&state, &|s: &mut QueryState<T>| settle(s, &result, updated_at));

    loop {
        let mut manual = match options.refetch_interval {
            Some(interval) => tokio::select! {
                _ = tokio::time::sleep(interval) => false,
                _ = refetch.notified() => true,
            },
            None => {
                refetch.notified().await;
                true
            }
        };

        if !manual && !options.refetch_in_background {
            // A manual refetch while hidden wakes the wait and fetches at once.
            while !*visible.borrow_and_update() {
                tokio::select! {
                    changed = visible.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = refetch.notified() => {
                        manual = true;
                        break;
                    }
                }
            }
        }

        log::trace!("{} {key}", if manual { "refetch" } else { "poll" });
        state.send_modify(|s| s.is_fetching = true);
        let result = cache.fetch(&key, &request, options.retry).await;
        let updated_at = cache.snapshot(&key).updated_at;
        publish(&state, &|s: &mut QueryState<T>| settle(s, &result, updated_at));
    }
}

/// Fold a finished fetch into the envelope. Failures keep existing data.
fn settle<T>(s: &mut QueryState<T>, result: &FetchResult, updated_at: Option<DateTime<Utc>>)
where
    T: DeserializeOwned,
{
    s.is_fetching = false;
    let decoded = result
        .as_ref()
        .map_err(Clone::clone)
        .and_then(|v| T::deserialize(&**v).map_err(QueryError::from));
    match decoded {
        Ok(data) => {
            s.status = QueryStatus::Success;
            s.data = Some(Arc::new(data));
            s.error = None;
            s.updated_at = updated_at;
            s.is_placeholder = false;
        }
        Err(e) => {
            s.status = QueryStatus::Error;
            s.error = Some(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::Transport;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize)]
    struct Counter {
        n: usize,
    }

    struct Seq {
        calls: AtomicUsize,
        fail_from: Option<usize>,
    }

    #[async_trait]
    impl Transport for Seq {
        async fn execute(&self, _request: &GraphQlRequest) -> Result<Value, QueryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_from {
                Some(k) if n >= k => Err(QueryError::Transport("connection refused".into())),
                _ => Ok(json!({ "n": n })),
            }
        }
    }

    fn setup(fail_from: Option<usize>) -> (QueryCache, Arc<Seq>) {
        let t = Arc::new(Seq {
            calls: AtomicUsize::new(0),
            fail_from,
        });
        (QueryCache::new(t.clone()), t)
    }

    fn opts() -> QueryOptions {
        QueryOptions::default().retry(RetryPolicy::none())
    }

    #[test]
    fn body_precedence() {
        let mut s: QueryState<Vec<u8>> = QueryState::loading();
        assert_eq!(s.body(|v| v.as_slice()), ListBody::Loading);

        s.status = QueryStatus::Success;
        s.data = Some(Arc::new(vec![]));
        assert_eq!(s.body(|v| v.as_slice()), ListBody::Empty);

        s.data = Some(Arc::new(vec![1, 2]));
        assert_eq!(s.body(|v| v.as_slice()), ListBody::Rows(&[1, 2][..]));

        s.status = QueryStatus::Error;
        assert_eq!(s.body(|v| v.as_slice()), ListBody::Error);

        let idle: QueryState<Vec<u8>> = QueryState::idle();
        assert_eq!(idle.body(|v| v.as_slice()), ListBody::Empty);
    }

    #[tokio::test]
    async fn disabled_query_stays_idle() {
        let (cache, t) = setup(None);
        let h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts().enabled(false),
            None,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        let s = h.state();
        assert!(s.is_idle());
        assert!(!s.is_loading());
        assert!(s.error.is_none());
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_read_goes_from_loading_to_success() {
        let (cache, _t) = setup(None);
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts(),
            None,
        );
        let s = h.wait_for(|s| s.is_success()).await.unwrap();
        assert_eq!(s.data.unwrap().n, 0);
        assert!(s.updated_at.is_some());
    }

    #[tokio::test]
    async fn polling_refetches_and_error_keeps_data() {
        let (cache, t) = setup(Some(1));
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts().refetch_interval(Duration::from_millis(10)),
            None,
        );
        let s = h.wait_for(|s| s.is_error()).await.unwrap();
        assert_eq!(s.data.as_ref().map(|d| d.n), Some(0));
        assert!(matches!(s.error, Some(QueryError::Transport(_))));
        assert!(t.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn hidden_handle_does_not_poll() {
        let (cache, t) = setup(None);
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts().refetch_interval(Duration::from_millis(5)),
            None,
        );
        h.wait_for(|s| s.is_success()).await.unwrap();
        h.set_visible(false);
        // Let any poll already past the visibility gate finish.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let paused_at = t.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(t.calls.load(Ordering::SeqCst), paused_at);

        h.set_visible(true);
        h.wait_for(|s| s.data.as_ref().map(|d| d.n).unwrap_or(0) >= paused_at)
            .await
            .unwrap();
        assert!(t.calls.load(Ordering::SeqCst) > paused_at);
    }

    #[tokio::test]
    async fn background_polling_ignores_visibility() {
        let (cache, t) = setup(None);
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts()
                .refetch_interval(Duration::from_millis(5))
                .refetch_in_background(true),
            None,
        );
        h.set_visible(false);
        h.wait_for(|s| s.data.as_ref().map(|d| d.n >= 3).unwrap_or(false))
            .await
            .unwrap();
        assert!(t.calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn respawn_keeps_previous_data_as_placeholder() {
        let (cache, _t) = setup(None);
        let mut first: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["page", "1"]),
            GraphQlRequest::latest_transactions(10, 0),
            opts().keep_previous_data(true),
            None,
        );
        first.wait_for(|s| s.is_success()).await.unwrap();

        let second = first.respawn(
            QueryKey::new(["page", "2"]),
            GraphQlRequest::latest_transactions(10, 10),
        );
        let s = second.state();
        assert!(s.is_placeholder);
        assert_eq!(s.data.as_ref().map(|d| d.n), Some(0));
    }

    #[tokio::test]
    async fn manual_refetch_without_polling() {
        let (cache, t) = setup(None);
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts(),
            None,
        );
        h.wait_for(|s| s.is_success()).await.unwrap();
        h.set_visible(false);
        h.refetch();
        let s = h
            .wait_for(|s| s.data.as_ref().map(|d| d.n == 1).unwrap_or(false))
            .await
            .unwrap();
        assert!(!s.is_fetching);
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn manual_refetch_reaches_hidden_polling_handle() {
        let (cache, t) = setup(None);
        let mut h: QueryHandle<Counter> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts().refetch_interval(Duration::from_millis(10)),
            None,
        );
        h.wait_for(|s| s.is_success()).await.unwrap();
        h.set_visible(false);
        // Past the next poll tick, the observer is parked on visibility.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let before = t.calls.load(Ordering::SeqCst);

        h.refetch();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(t.calls.load(Ordering::SeqCst), before + 1);
        assert_eq!(h.state().data.map(|d| d.n), Some(before));
    }

    #[tokio::test]
    async fn unmounted_fetch_still_fills_cache() {
        struct Slow;

        #[async_trait]
        impl Transport for Slow {
            async fn execute(&self, _request: &GraphQlRequest) -> Result<Value, QueryError> {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(json!({ "n": 7 }))
            }
        }

        let cache = QueryCache::new(Arc::new(Slow));
        let key = QueryKey::new(["slow"]);
        let h: QueryHandle<Counter> =
            QueryHandle::spawn(&cache, key.clone(), GraphQlRequest::node_info(), opts(), None);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.snapshot(&key).is_fetching);
        drop(h);
        assert!(cache.snapshot(&key).data.is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let snap = cache.snapshot(&key);
        assert_eq!(snap.data.as_deref(), Some(&json!({ "n": 7 })));
        assert!(!snap.is_fetching);
        assert!(snap.updated_at.is_some());
    }

    #[tokio::test]
    async fn dropping_handle_unsubscribes() {
        let (cache, _t) = setup(None);
        let key = QueryKey::new(["x"]);
        let h: QueryHandle<Counter> =
            QueryHandle::spawn(&cache, key.clone(), GraphQlRequest::node_info(), opts(), None);
        assert_eq!(cache.subscribers(&key), 1);
        drop(h);
        assert_eq!(cache.subscribers(&key), 0);
    }

    #[tokio::test]
    async fn decode_failure_is_an_error() {
        #[derive(Debug, Deserialize)]
        struct Wrong {
            #[allow(dead_code)]
            missing: String,
        }
        let (cache, _t) = setup(None);
        let mut h: QueryHandle<Wrong> = QueryHandle::spawn(
            &cache,
            QueryKey::new(["x"]),
            GraphQlRequest::node_info(),
            opts(),
            None,
        );
        let s = h.wait_for(|s| s.is_error()).await.unwrap();
        assert!(matches!(s.error, Some(QueryError::Decode(_))));
    }
}
