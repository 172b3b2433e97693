//! "Recent Blocks" tab.

use crate::graphql::GraphQlRequest;
use crate::pagination::{total_pages_from_height, PageWindow, Paginator, PAGE_SIZE};
use crate::query::{ListBody, QueryHandle, QueryOptions, QueryState};
use crate::query_cache::{QueryCache, QueryKey};
use crate::types::{AppEvent, Block, RecentBlocksData};
use tokio::sync::mpsc::UnboundedSender;

pub const LOADING_TEXT: &str = "Loading blocks...";
pub const ERROR_TEXT: &str = "Error loading blocks";
pub const EMPTY_TEXT: &str = "No blocks found";

fn page_query(page: u32) -> (QueryKey, GraphQlRequest) {
    let w = PageWindow::for_page(PAGE_SIZE, page);
    (
        QueryKey::new(["blocks".to_string(), "recent".to_string(), page.to_string()]),
        GraphQlRequest::recent_blocks(w.take, w.skip),
    )
}

pub struct BlockList {
    pager: Paginator,
    handle: QueryHandle<RecentBlocksData>,
    selected: usize,
}

impl BlockList {
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

    pub fn state(&self) -> QueryState<RecentBlocksData> {
        self.handle.state()
    }

    pub fn page(&self) -> u32 {
        self.pager.current()
    }

    /// Total pages follow the tallest height on the page being shown, so the
    /// count moves as new blocks are produced.
    pub fn paginator(&self) -> Paginator {
        let max_height = self
            .handle
            .state()
            .data
            .and_then(|d| d.blocks.iter().map(|b| b.height).max())
            .unwrap_or(0);
        let mut p = self.pager;
        p.set_total(total_pages_from_height(max_height, PAGE_SIZE));
        p
    }

    pub fn next_page(&mut self) {
        let mut p = self.paginator();
        if p.next() {
            self.go_to(p.current());
        }
    }

    pub fn prev_page(&mut self) {
        let mut p = self.paginator();
        if p.prev() {
            self.go_to(p.current());
        }
    }

    /// Jump to a listed page number.
    pub fn select_page(&mut self, page: u32) {
        self.go_to(page);
    }

    pub fn first_page(&mut self) {
        self.go_to(1);
    }

    pub fn last_page(&mut self) {
        let total = self.paginator().total();
        if total > 0 {
            self.go_to(total);
        }
    }

    fn go_to(&mut self, page: u32) {
        if !self.pager.select(page) {
            return;
        }
        log::debug!("blocks page {page}");
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
        let len = self
            .handle
            .state()
            .data
            .map(|d| d.blocks.len())
            .unwrap_or(0);
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_block(&self) -> Option<Block> {
        let state = self.handle.state();
        // Rows held over from the previous page are not selectable.
        if state.is_placeholder {
            return None;
        }
        match state.body(|d| d.blocks.as_slice()) {
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
    use std::sync::Arc;

    /// A chain of `tip` blocks served newest first.
    struct Chain {
        tip: u64,
    }

    #[async_trait]
    impl Transport for Chain {
        async fn execute(&self, request: &GraphQlRequest) -> Result<Value, QueryError> {
            let take = request.variables["take"].as_u64().unwrap_or(10);
            let skip = request.variables["skip"].as_u64().unwrap_or(0);
            let blocks: Vec<Value> = (0..take)
                .filter_map(|i| self.tip.checked_sub(skip + i))
                .filter(|h| *h > 0)
                .map(|h| json!({ "hash": format!("0xblock{h}"), "height": h, "transactions": [] }))
                .collect();
            Ok(json!({ "blocks": blocks, "aggregateBlock": { "_count": { "_all": blocks.len() } } }))
        }
    }

    async fn loaded(tip: u64) -> BlockList {
        let cache = QueryCache::new(Arc::new(Chain { tip }));
        let mut list = BlockList::new(&cache, QueryOptions::default().retry(RetryPolicy::none()), None);
        list.handle
            .wait_for(|s| s.is_success() && !s.is_placeholder)
            .await
            .unwrap();
        list
    }

    #[tokio::test]
    async fn total_pages_follow_tip_height() {
        let list = loaded(95).await;
        let p = list.paginator();
        assert_eq!(p.total(), 10);
        assert!(!p.has_prev());
        assert!(p.has_next());
    }

    #[tokio::test]
    async fn navigation_requests_the_right_window() {
        let mut list = loaded(95).await;
        list.select_page(5);
        assert!(list.state().is_placeholder);
        assert!(list.selected_block().is_none());
        list.handle
            .wait_for(|s| s.is_success() && !s.is_placeholder)
            .await
            .unwrap();
        assert_eq!(list.selected_block().unwrap().height, 55);

        list.prev_page();
        assert_eq!(list.page(), 4);
    }

    #[tokio::test]
    async fn last_page_from_total() {
        let mut list = loaded(95).await;
        list.last_page();
        assert_eq!(list.page(), 10);
    }
}
