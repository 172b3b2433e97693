//! Transaction search overlay.
//!
//! The query is only enabled once the input reaches `MIN_QUERY_LEN`
//! characters; shorter input leaves the handle idle and issues nothing.

use crate::graphql::GraphQlRequest;
use crate::query::{QueryHandle, QueryOptions, QueryStatus};
use crate::query_cache::{QueryCache, QueryKey};
use crate::types::{AppEvent, Transaction, TransactionsData};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub const MIN_QUERY_LEN: usize = 3;
pub const RESULT_LIMIT: u32 = 10;

pub const SEARCHING_TEXT: &str = "Searching...";
pub const ERROR_TEXT: &str = "Error searching transactions";
pub const TOO_SHORT_TEXT: &str = "Enter at least 3 characters to search";
pub const EMPTY_TEXT: &str = "No transactions found";

pub struct Search {
    cache: QueryCache,
    options: QueryOptions,
    notify: Option<UnboundedSender<AppEvent>>,
    text: String,
    handle: QueryHandle<TransactionsData>,
    selected: usize,
}

impl Search {
    pub fn new(
        cache: &QueryCache,
        options: QueryOptions,
        stale_time: Duration,
        notify: Option<UnboundedSender<AppEvent>>,
    ) -> Self {
        let options = options.stale_time(stale_time);
        let handle = mount(cache, "", options, notify.clone());
        Self {
            cache: cache.clone(),
            options,
            notify,
            text: String::new(),
            handle,
            selected: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_active(&self) -> bool {
        self.text.chars().count() >= MIN_QUERY_LEN
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
        self.requery();
    }

    pub fn pop(&mut self) {
        if self.text.pop().is_some() {
            self.requery();
        }
    }

    pub fn clear(&mut self) {
        if !self.text.is_empty() {
            self.text.clear();
            self.requery();
        }
    }

    fn requery(&mut self) {
        self.handle = mount(&self.cache, &self.text, self.options, self.notify.clone());
        self.selected = 0;
    }

    /// Placeholder line to show instead of results, if any.
    pub fn status_text(&self) -> Option<&'static str> {
        let state = self.handle.state();
        match state.status {
            QueryStatus::Loading => Some(SEARCHING_TEXT),
            QueryStatus::Error => Some(ERROR_TEXT),
            _ if !self.is_active() => Some(TOO_SHORT_TEXT),
            _ => match &state.data {
                Some(d) if !d.transactions.is_empty() => None,
                _ => Some(EMPTY_TEXT),
            },
        }
    }

    pub fn results(&self) -> Vec<Transaction> {
        let state = self.handle.state();
        match (state.status, state.data) {
            (QueryStatus::Success, Some(d)) => d.transactions.clone(),
            _ => Vec::new(),
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.results().len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_tx(&self) -> Option<Transaction> {
        self.results().into_iter().nth(self.selected)
    }
}

fn mount(
    cache: &QueryCache,
    text: &str,
    options: QueryOptions,
    notify: Option<UnboundedSender<AppEvent>>,
) -> QueryHandle<TransactionsData> {
    let enabled = text.chars().count() >= MIN_QUERY_LEN;
    QueryHandle::spawn(
        cache,
        QueryKey::new(["transactions", "search", text]),
        GraphQlRequest::search_transactions(text, RESULT_LIMIT),
        options.enabled(enabled),
        notify,
    )
}
