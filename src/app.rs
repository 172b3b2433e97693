use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::block_list::BlockList;
use crate::config::Config;
use crate::details::{BlockDetail, Detail, DetailAction, TxDetail};
use crate::node_status::NodeStatus;
use crate::query::QueryOptions;
use crate::query_cache::QueryCache;
use crate::search::Search;
use crate::theme::ColorScheme;
use crate::tx_list::TxList;
use crate::types::AppEvent;

/// How long "Copied!" stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(1);
/// Unobserved cache entries older than this are evicted.
pub const CACHE_TIME: Duration = Duration::from_secs(5 * 60);
const GC_EVERY: Duration = Duration::from_secs(30);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tab {
    Transactions,
    Blocks,
    Analytics,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Transactions, Tab::Blocks, Tab::Analytics];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Transactions => "Transactions",
            Tab::Blocks => "Blocks",
            Tab::Analytics => "Analytics",
        }
    }

    fn next(self) -> Self {
        match self {
            Tab::Transactions => Tab::Blocks,
            Tab::Blocks => Tab::Analytics,
            Tab::Analytics => Tab::Transactions,
        }
    }

    fn prev(self) -> Self {
        match self {
            Tab::Transactions => Tab::Analytics,
            Tab::Blocks => Tab::Transactions,
            Tab::Analytics => Tab::Blocks,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Detail,
}

pub struct App {
    quit: bool,
    fps: u32,
    colors: ColorScheme,
    endpoint: String,

    cache: QueryCache,
    notify: Option<UnboundedSender<AppEvent>>,
    search_options: QueryOptions,
    search_stale: Duration,

    tab: Tab,
    node: NodeStatus,
    txs: TxList,
    blocks: BlockList,
    /// Mounted only while the overlay is open.
    search: Option<Search>,
    detail: Option<Detail>,

    toast_message: Option<(String, Instant)>,
    last_gc: Instant,
    dirty: bool,
}

impl App {
    /// Mounts the header and both lists. Must be called inside a tokio runtime.
    pub fn new(cfg: &Config, cache: QueryCache, notify: Option<UnboundedSender<AppEvent>>) -> Self {
        let base = cfg.query_options();
        let polled = base.refetch_interval(cfg.poll_interval());

        let node = NodeStatus::new(&cache, polled, notify.clone());
        let txs = TxList::new(&cache, polled, notify.clone());
        let blocks = BlockList::new(&cache, polled, notify.clone());

        let mut app = Self {
            quit: false,
            fps: cfg.render_fps,
            colors: cfg.theme.colors(),
            endpoint: cfg.graphql_url.clone(),
            cache,
            notify,
            search_options: base,
            search_stale: cfg.search_stale_time(),
            tab: Tab::Transactions,
            node,
            txs,
            blocks,
            search: None,
            detail: None,
            toast_message: None,
            last_gc: Instant::now(),
            dirty: true,
        };
        app.sync_visibility();
        app
    }

    // ----- getters -----
    pub fn fps(&self) -> u32 {
        self.fps
    }
    pub fn quit_flag(&self) -> bool {
        self.quit
    }
    pub fn colors(&self) -> &ColorScheme {
        &self.colors
    }
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
    pub fn tab(&self) -> Tab {
        self.tab
    }
    pub fn node(&self) -> &NodeStatus {
        &self.node
    }
    pub fn txs(&self) -> &TxList {
        &self.txs
    }
    pub fn blocks(&self) -> &BlockList {
        &self.blocks
    }
    pub fn search(&self) -> Option<&Search> {
        self.search.as_ref()
    }
    pub fn detail(&self) -> Option<&Detail> {
        self.detail.as_ref()
    }

    pub fn input_mode(&self) -> InputMode {
        if self.detail.is_some() {
            InputMode::Detail
        } else if self.search.is_some() {
            InputMode::Search
        } else {
            InputMode::Normal
        }
    }

    /// True once since the last call if anything changed that needs a redraw.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn on_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::QueryUpdated(key) => {
                log::trace!("updated {key}");
                self.dirty = true;
            }
            AppEvent::Quit => self.quit = true,
        }
    }

    /// Periodic housekeeping, called from the render loop.
    pub fn tick(&mut self) {
        if self.last_gc.elapsed() >= GC_EVERY {
            self.cache.collect_garbage(CACHE_TIME);
            self.last_gc = Instant::now();
        }
        if let Some((_, at)) = &self.toast_message {
            if at.elapsed() >= TOAST_TTL {
                self.toast_message = None;
                self.dirty = true;
            }
        }
    }

    // ----- toast -----
    pub fn show_toast(&mut self, msg: impl Into<String>) {
        self.toast_message = Some((msg.into(), Instant::now()));
        self.dirty = true;
    }

    pub fn toast_message(&self) -> Option<&str> {
        self.toast_message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < TOAST_TTL)
            .map(|(msg, _)| msg.as_str())
    }

    // ----- tabs -----
    pub fn next_tab(&mut self) {
        self.set_tab(self.tab.next());
    }

    pub fn prev_tab(&mut self) {
        self.set_tab(self.tab.prev());
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.sync_visibility();
        self.dirty = true;
    }

    /// Lists poll only while their tab is shown, unless background polling
    /// is configured.
    fn sync_visibility(&self) {
        self.txs.set_visible(self.tab == Tab::Transactions);
        self.blocks.set_visible(self.tab == Tab::Blocks);
    }

    /// Invalidate everything and refetch the mounted queries.
    pub fn refresh(&mut self) {
        let n = self.cache.invalidate(&[]);
        log::info!("refresh: invalidated {n} cache entries");
        self.node.refresh();
        self.txs.refresh();
        self.blocks.refresh();
        self.dirty = true;
    }

    // ----- list navigation -----
    pub fn up(&mut self) {
        match self.input_mode() {
            InputMode::Detail => {
                if let Some(d) = &mut self.detail {
                    d.up();
                }
            }
            InputMode::Search => {
                if let Some(s) = &mut self.search {
                    s.select_prev();
                }
            }
            InputMode::Normal => match self.tab {
                Tab::Transactions => self.txs.select_prev(),
                Tab::Blocks => self.blocks.select_prev(),
                Tab::Analytics => {}
            },
        }
        self.dirty = true;
    }

    pub fn down(&mut self) {
        match self.input_mode() {
            InputMode::Detail => {
                if let Some(d) = &mut self.detail {
                    d.down();
                }
            }
            InputMode::Search => {
                if let Some(s) = &mut self.search {
                    s.select_next();
                }
            }
            InputMode::Normal => match self.tab {
                Tab::Transactions => self.txs.select_next(),
                Tab::Blocks => self.blocks.select_next(),
                Tab::Analytics => {}
            },
        }
        self.dirty = true;
    }

    pub fn next_page(&mut self) {
        match self.tab {
            Tab::Transactions => self.txs.next_page(),
            Tab::Blocks => self.blocks.next_page(),
            Tab::Analytics => {}
        }
        self.dirty = true;
    }

    pub fn prev_page(&mut self) {
        match self.tab {
            Tab::Transactions => self.txs.prev_page(),
            Tab::Blocks => self.blocks.prev_page(),
            Tab::Analytics => {}
        }
        self.dirty = true;
    }

    pub fn first_page(&mut self) {
        if self.tab == Tab::Blocks {
            self.blocks.first_page();
            self.dirty = true;
        }
    }

    pub fn last_page(&mut self) {
        if self.tab == Tab::Blocks {
            self.blocks.last_page();
            self.dirty = true;
        }
    }

    // ----- overlays -----
    /// Open the detail overlay for the selected row.
    pub fn open_selected(&mut self) {
        let detail = match self.tab {
            Tab::Transactions => self.txs.selected_tx().map(|t| Detail::Tx(TxDetail::new(t))),
            Tab::Blocks => self
                .blocks
                .selected_block()
                .map(|b| Detail::Block(BlockDetail::new(b))),
            Tab::Analytics => None,
        };
        if detail.is_some() {
            self.detail = detail;
            self.dirty = true;
        }
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
        self.dirty = true;
    }

    pub fn detail_next_tab(&mut self) {
        if let Some(d) = &mut self.detail {
            d.next_tab();
            self.dirty = true;
        }
    }

    /// Activate the row under the detail cursor. Returns text to copy.
    pub fn detail_activate(&mut self) -> Option<String> {
        let action = self.detail.as_mut()?.activate();
        self.dirty = true;
        match action? {
            DetailAction::Copy(text) => Some(text),
            DetailAction::Toggled => None,
        }
    }

    pub fn start_search(&mut self) {
        if self.search.is_none() {
            self.search = Some(Search::new(
                &self.cache,
                self.search_options,
                self.search_stale,
                self.notify.clone(),
            ));
            self.dirty = true;
        }
    }

    pub fn close_search(&mut self) {
        self.search = None;
        self.dirty = true;
    }

    pub fn search_add_char(&mut self, c: char) {
        if let Some(s) = &mut self.search {
            s.push(c);
            self.dirty = true;
        }
    }

    pub fn search_backspace(&mut self) {
        if let Some(s) = &mut self.search {
            s.pop();
            self.dirty = true;
        }
    }

    /// Open the selected search hit and close the search overlay.
    pub fn search_open_selected(&mut self) {
        let Some(tx) = self.search.as_ref().and_then(|s| s.selected_tx()) else {
            return;
        };
        self.search = None;
        self.detail = Some(Detail::Tx(TxDetail::new(tx)));
        self.dirty = true;
    }
}
