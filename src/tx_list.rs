//! "Latest Transactions" tab.

use crate::graphql::GraphQlRequest;
use crate::pagination::{PageWindow, Paginator, PAGE_SIZE};
use crate::query::{ListBody, QueryHandle, QueryOptions, QueryState};
use crate::query_cache::{QueryCache, QueryKey};
use crate::types::{AppEvent, Transaction, TransactionsData};
use tokio::sync::mpsc::UnboundedSender;

pub const LOADING_TEXT: &str = "Loading transactions...";
pub const ERROR_TEXT: &str = "Error loading transactions";
pub const EMPTY_TEXT: &str = "No transactions found";

fn page_query(page: u32) -> (QueryKey, GraphQlRequest) {
    let w = PageWindow::for_page(PAGE_SIZE, page);
    (
        QueryKey::new(["transactions".to_string(), "latest".to_string(), page.to_string()]),
        GraphQlRequest::latest_transactions(w.take, w.skip),
    )
}

pub struct TxList {
    pager: Paginator,
    handle: QueryHandle<TransactionsData>,
    selected: usize,
}

impl TxList {
    /// `options` should already carry the polling interval.
    pub fn new(
        cache: &QueryCache,
        options: QueryOptions,
        notify: Option<UnboundedSender<AppEvent>>,
    ) -> Self {
        let (key, request) = page_query(1);
        let handle = QueryHandle::spawn(
            cache,
            key,
            request,
            options.keep_previous_data(true),
            notify,
        );
        Self {
            pager: Paginator::default(),
            handle,
            selected: 0,
        }
    }

    pub fn state(&self) -> QueryState<TransactionsData> {
        self.handle.state()
    }

    pub fn page(&self) -> u32 {
        self.pager.current()
    }

    /// There is no server-side total for transactions. A full page means
    /// there may be another one after it.
    pub fn paginator(&self) -> Paginator {
        let full = self
            .handle
            .state()
            .data
            .map(|d| d.transactions.len() as u32 >= PAGE_SIZE)
            .unwrap_or(false);
        let mut p = self.pager;
        p.set_total(p.current() + u32::from(full));
        p
    }

    pub fn next_page(&mut self) {
        let mut p = self.paginator();
        if p.next() {
            self.go_to(p.current());
        }
    }

    pub fn prev_page(&mut self) {
        if self.pager.has_prev() {
            self.go_to(self.pager.current() - 1);
        }
    }

    fn go_to(&mut self, page: u32) {
        if !self.pager.select(page) {
            return;
        }
        log::debug!("transactions page {page}");
        let (key, request) = page_query(page);
        let visible = self.handle.is_visible();
        self.handle = self.handle.respawn(key, request);
        self.handle.set_visible(visible);
        self.selected = 0;
    }

    pub fn set_visible(&self, visible: bool) {
        self.handle.set_visible(visible);
    }

    pub fn refresh(&self) {
        self.handle.refetch();
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        let len = self.row_count();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn row_count(&self) -> usize {
        self.handle
            .state()
            .data
            .map(|d| d.transactions.len())
            .unwrap_or(0)
    }

    /// Row under the cursor, if the list currently shows rows.
    pub fn selected_tx(&self) -> Option<Transaction> {
        let state = self.handle.state();
        // Rows held over from the previous page are not selectable.
        if state.is_placeholder {
            return None;
        }
        match state.body(|d| d.transactions.as_slice()) {
            ListBody::Rows(rows) => rows.get(self.selected.min(rows.len() - 1)).cloned(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::graphql::Transport;
    use crate::query_cache::RetryPolicy;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Serves `rows` transactions per page and records requested skips.
    struct Pages {
        rows: usize,
        skips: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Transport for Pages {
        async fn execute(&self, request: &GraphQlRequest) -> Result<Value, QueryError> {
            let skip = request.variables["skip"].as_u64().unwrap_or(0);
            self.skips.lock().unwrap().push(skip);
            let txs: Vec<Value> = (0..self.rows)
                .map(|i| {
                    json!({
                        "hash": format!("0xhash{}", skip as usize + i),
                        "methodId": "0xabc",
                        "sender": "B62qsender",
                        "nonce": i,
                        "isMessage": false
                    })
                })
                .collect();
            Ok(json!({ "transactions": txs }))
        }
    }

    fn setup(rows: usize) -> (QueryCache, Arc<Pages>) {
        let t = Arc::new(Pages {
            rows,
            skips: Mutex::new(Vec::new()),
        });
        (QueryCache::new(t.clone()), t)
    }

    async fn settle(list: &mut TxList) {
        list.handle
            .wait_for(|s| s.is_success() && !s.is_placeholder)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_page_allows_next() {
        let (cache, t) = setup(10);
        let mut list = TxList::new(&cache, QueryOptions::default().retry(RetryPolicy::none()), None);
        settle(&mut list).await;
        assert_eq!(list.paginator().total(), 2);

        list.next_page();
        assert_eq!(list.page(), 2);
        assert!(list.state().is_placeholder);
        assert!(list.selected_tx().is_none());
        settle(&mut list).await;
        assert_eq!(*t.skips.lock().unwrap(), vec![0, 10]);
        assert_eq!(list.selected_tx().unwrap().hash, "0xhash10");
    }

    #[tokio::test]
    async fn short_page_is_the_last() {
        let (cache, _t) = setup(3);
        let mut list = TxList::new(&cache, QueryOptions::default().retry(RetryPolicy::none()), None);
        settle(&mut list).await;
        list.next_page();
        assert_eq!(list.page(), 1);

        list.select_next();
        list.select_next();
        list.select_next();
        assert_eq!(list.selected(), 2);
    }
}
