//! Page windowing and the compressed page-number strip.

use std::fmt;

/// Rows per page for every list view.
pub const PAGE_SIZE: u32 = 10;

/// Lists with at most this many pages show every page number.
const MAX_VISIBLE_PAGES: u32 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageItem::Page(n) => write!(f, "{n}"),
            PageItem::Ellipsis => write!(f, "..."),
        }
    }
}

/// Page labels to display for `current` (1-based) out of `total`.
pub fn page_numbers(current: u32, total: u32) -> Vec<PageItem> {
    use PageItem::{Ellipsis, Page};

    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(Page).collect();
    }

    let mut items = Vec::with_capacity(7);
    if current <= 3 {
        items.extend((1..=4).map(Page));
        items.push(Ellipsis);
        items.push(Page(total));
    } else if current >= total - 2 {
        items.push(Page(1));
        items.push(Ellipsis);
        items.extend((total - 3..=total).map(Page));
    } else {
        items.push(Page(1));
        items.push(Ellipsis);
        items.extend((current - 1..=current + 1).map(Page));
        items.push(Ellipsis);
        items.push(Page(total));
    }
    items
}

/// `take`/`skip` pair for one page.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub take: u32,
    pub skip: u32,
}

impl PageWindow {
    pub fn for_page(page_size: u32, page: u32) -> Self {
        Self {
            take: page_size,
            skip: page.saturating_sub(1).saturating_mul(page_size),
        }
    }
}

/// Page count implied by the tallest block height seen on the current page.
///
/// This is an approximation that moves as new blocks arrive; the server's
/// aggregate count is not consulted.
pub fn total_pages_from_height(max_height: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = max_height.div_ceil(page_size as u64);
    pages.min(u32::MAX as u64) as u32
}

/// Current page plus the page count it is navigated within.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Paginator {
    current: u32,
    total: u32,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            current: 1,
            total: 0,
        }
    }
}

impl Paginator {
    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn set_total(&mut self, total: u32) {
        self.total = total;
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total
    }

    /// Returns whether the page changed.
    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Returns whether the page changed.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Jump to `page` without a bounds check; callers pass a listed page.
    pub fn select(&mut self, page: u32) -> bool {
        let changed = self.current != page;
        self.current = page;
        changed
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::for_page(PAGE_SIZE, self.current)
    }

    pub fn items(&self) -> Vec<PageItem> {
        page_numbers(self.current, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::PageItem::{Ellipsis, Page};
    use super::*;

    #[test]
    fn small_totals_list_every_page() {
        for total in 0..=5 {
            for current in 1..=total.max(1) {
                let items = page_numbers(current, total);
                assert_eq!(items, (1..=total).map(Page).collect::<Vec<_>>());
                assert!(!items.contains(&Ellipsis));
            }
        }
    }

    #[test]
    fn start_of_range() {
        assert_eq!(
            page_numbers(1, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]
        );
        assert_eq!(page_numbers(3, 10), page_numbers(1, 10));
    }

    #[test]
    fn end_of_range() {
        assert_eq!(
            page_numbers(10, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)]
        );
        assert_eq!(page_numbers(8, 10), page_numbers(10, 10));
    }

    #[test]
    fn middle_of_range() {
        assert_eq!(
            page_numbers(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn first_and_last_always_present_above_five() {
        for total in 6..40 {
            for current in 1..=total {
                let items = page_numbers(current, total);
                assert_eq!(items.first(), Some(&Page(1)));
                assert_eq!(items.last(), Some(&Page(total)));
            }
        }
    }

    #[test]
    fn window_skips_previous_pages() {
        assert_eq!(PageWindow::for_page(10, 1), PageWindow { take: 10, skip: 0 });
        assert_eq!(PageWindow::for_page(10, 4), PageWindow { take: 10, skip: 30 });
    }

    #[test]
    fn total_from_height_rounds_up() {
        assert_eq!(total_pages_from_height(0, 10), 0);
        assert_eq!(total_pages_from_height(1, 10), 1);
        assert_eq!(total_pages_from_height(10, 10), 1);
        assert_eq!(total_pages_from_height(101, 10), 11);
    }

    #[test]
    fn prev_next_are_noops_at_the_edges() {
        let mut p = Paginator::default();
        p.set_total(3);
        assert!(!p.prev());
        assert_eq!(p.current(), 1);
        assert!(p.next());
        assert!(p.next());
        assert!(!p.next());
        assert_eq!(p.current(), 3);
    }

    #[test]
    fn select_is_unchecked() {
        let mut p = Paginator::default();
        p.set_total(2);
        assert!(p.select(7));
        assert_eq!(p.current(), 7);
        assert!(!p.select(7));
    }
}
