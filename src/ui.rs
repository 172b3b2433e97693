use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Row, Table,
        TableState, Tabs, Wrap,
    },
    Frame,
};

use crate::app::{App, InputMode, Tab};
use crate::block_list;
use crate::details::{BlockDetail, BlockTab, Detail, Field, TxDetail};
use crate::json_tree::{render_rows, TreeRow};
use crate::node_status::{self, NodeLine};
use crate::pagination::{PageItem, Paginator};
use crate::query::{ListBody, QueryState};
use crate::search::{self, Search};
use crate::theme::ColorScheme;
use crate::tx_list;
use crate::util_text::{format_method_id, relative_time, shorten_hash, status_label, tx_kind_label};

// ===============================
// Top-level draw
// ===============================
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title + node status
            Constraint::Length(2), // tab bar
            Constraint::Min(0),    // body
            Constraint::Length(1), // pagination
            Constraint::Length(2), // footer
        ])
        .split(f.area());

    header(f, chunks[0], app);
    tab_bar(f, chunks[1], app);
    match app.tab() {
        Tab::Transactions => {
            tx_table(f, chunks[2], app);
            pagination_bar(f, chunks[3], app, &app.txs().paginator());
        }
        Tab::Blocks => {
            block_table(f, chunks[2], app);
            pagination_bar(f, chunks[3], app, &app.blocks().paginator());
        }
        Tab::Analytics => analytics(f, chunks[2], app),
    }
    footer(f, chunks[4], app);

    // Overlays render last
    if let Some(s) = app.search() {
        draw_search_overlay(f, app, s);
    }
    if let Some(d) = app.detail() {
        draw_detail_overlay(f, app.colors(), d);
    }
    if app.toast_message().is_some() {
        draw_toast(f, app);
    }
}

// ===============================
// Header / tabs
// ===============================
fn header(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let title = Line::from(vec![
        Span::styled(
            "ProtoScope Explorer",
            Style::default().fg(c.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", app.endpoint()), Style::default().fg(c.text_dim)),
    ]);
    f.render_widget(Paragraph::new(title), halves[0]);

    let status = match app.node().line() {
        NodeLine::Loading => Line::from(Span::styled("…", Style::default().fg(c.text_dim))),
        NodeLine::Failed => Line::from(Span::styled(
            node_status::ERROR_TEXT,
            Style::default().fg(c.failure),
        )),
        NodeLine::Heights { block, batch } => Line::from(vec![
            Span::styled("Block Height: ", Style::default().fg(c.text_dim)),
            Span::styled(
                block.to_string(),
                Style::default().fg(c.text).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Batch Height: ", Style::default().fg(c.text_dim)),
            Span::styled(
                batch.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
                Style::default().fg(c.text).add_modifier(Modifier::BOLD),
            ),
        ]),
    };
    f.render_widget(
        Paragraph::new(status).alignment(ratatui::layout::Alignment::Right),
        halves[1],
    );
}

fn tab_bar(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let selected = Tab::ALL.iter().position(|t| *t == app.tab()).unwrap_or(0);
    let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
        .select(selected)
        .style(Style::default().fg(c.text_dim))
        .highlight_style(Style::default().fg(c.accent).add_modifier(Modifier::BOLD))
        .divider("│")
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(c.border)),
        );
    f.render_widget(tabs, area);
}

// ===============================
// Lists
// ===============================
fn list_block<'a, T>(title: &'a str, state: &QueryState<T>, c: &ColorScheme) -> Block<'a> {
    let mut t = format!(" {title} ");
    if let Some(at) = state.updated_at {
        t.push_str(&format!("· updated {} ", relative_time(at, Utc::now())));
    }
    if state.is_fetching {
        t.push_str("⟳ ");
    }
    Block::default()
        .title(t)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c.border))
}

fn placeholder(f: &mut Frame, area: Rect, block: Block, text: &str, fg: ratatui::style::Color) {
    let p = Paragraph::new(text)
        .style(Style::default().fg(fg))
        .alignment(ratatui::layout::Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

fn tx_table(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let state = app.txs().state();
    let block = list_block("Latest Transactions", &state, c);

    let rows = match state.body(|d| d.transactions.as_slice()) {
        ListBody::Loading => return placeholder(f, area, block, tx_list::LOADING_TEXT, c.text_dim),
        ListBody::Error => return placeholder(f, area, block, tx_list::ERROR_TEXT, c.failure),
        ListBody::Empty => return placeholder(f, area, block, tx_list::EMPTY_TEXT, c.text_dim),
        ListBody::Rows(rows) => rows,
    };

    let body: Vec<Row> = rows
        .iter()
        .map(|tx| {
            let kind_fg = if tx.is_message { c.message } else { c.success };
            Row::new(vec![
                Span::raw(shorten_hash(&tx.hash)),
                Span::raw(
                    tx.block_height()
                        .map(|h| h.to_string())
                        .unwrap_or_else(|| "Pending".into()),
                ),
                Span::raw(format_method_id(&tx.method_id)),
                Span::raw(shorten_hash(&tx.sender)),
                Span::styled(tx_kind_label(tx.is_message), Style::default().fg(kind_fg)),
                Span::styled(status_label(tx.status()), Style::default().fg(c.status(tx.status()))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(15),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(15),
        Constraint::Length(12),
        Constraint::Min(8),
    ];
    let table = Table::new(body, widths)
        .header(header_row(&["Hash", "Block", "Method", "Sender", "Type", "Status"], c))
        .row_highlight_style(Style::default().bg(c.selection_bg).fg(c.selection_fg))
        .block(block);

    let mut st = TableState::default().with_selected(Some(app.txs().selected().min(rows.len() - 1)));
    f.render_stateful_widget(table, area, &mut st);
}

fn block_table(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let state = app.blocks().state();
    let block = list_block("Recent Blocks", &state, c);

    let rows = match state.body(|d| d.blocks.as_slice()) {
        ListBody::Loading => return placeholder(f, area, block, block_list::LOADING_TEXT, c.text_dim),
        ListBody::Error => return placeholder(f, area, block, block_list::ERROR_TEXT, c.failure),
        ListBody::Empty => return placeholder(f, area, block, block_list::EMPTY_TEXT, c.text_dim),
        ListBody::Rows(rows) => rows,
    };

    let body: Vec<Row> = rows
        .iter()
        .map(|b| {
            Row::new(vec![
                b.height.to_string(),
                shorten_hash(&b.hash),
                b.transactions.len().to_string(),
                b.successful_tx_count().to_string(),
                b.batch_height.map(|h| h.to_string()).unwrap_or_else(|| "-".into()),
                b.parent_hash.as_deref().map(shorten_hash).unwrap_or_else(|| "-".into()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(10),
        Constraint::Length(15),
        Constraint::Length(6),
        Constraint::Length(11),
        Constraint::Length(8),
        Constraint::Min(15),
    ];
    let table = Table::new(body, widths)
        .header(header_row(&["Height", "Hash", "Txs", "Successful", "Batch", "Parent"], c))
        .row_highlight_style(Style::default().bg(c.selection_bg).fg(c.selection_fg))
        .block(block);

    let mut st = TableState::default().with_selected(Some(app.blocks().selected().min(rows.len() - 1)));
    f.render_stateful_widget(table, area, &mut st);
}

fn header_row<'a>(titles: &[&'a str], c: &ColorScheme) -> Row<'a> {
    Row::new(titles.to_vec()).style(Style::default().fg(c.text_dim).add_modifier(Modifier::BOLD))
}

fn analytics(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c.border));
    placeholder(f, area, block, "Analytics coming soon", c.text_dim);
}

fn pagination_bar(f: &mut Frame, area: Rect, app: &App, p: &Paginator) {
    let c = app.colors();
    let enabled = |on: bool| {
        if on {
            Style::default().fg(c.text)
        } else {
            Style::default().fg(c.text_dim).add_modifier(Modifier::DIM)
        }
    };

    let mut spans = vec![Span::styled("‹ Prev ", enabled(p.has_prev()))];
    for item in p.items() {
        let style = match item {
            PageItem::Page(n) if n == p.current() => Style::default()
                .fg(c.selection_fg)
                .bg(c.selection_bg)
                .add_modifier(Modifier::BOLD),
            PageItem::Page(_) => Style::default().fg(c.text),
            PageItem::Ellipsis => Style::default().fg(c.text_dim),
        };
        spans.push(Span::styled(format!(" {item} "), style));
    }
    spans.push(Span::styled(" Next ›", enabled(p.has_next())));
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(ratatui::layout::Alignment::Center),
        area,
    );
}

// ===============================
// Footer
// ===============================
fn footer(f: &mut Frame, area: Rect, app: &App) {
    let c = app.colors();
    let key = |k: &'static str| Span::styled(k, Style::default().fg(c.accent));
    let mut spans: Vec<Span> = match app.input_mode() {
        InputMode::Normal => vec![
            key("Tab"),
            Span::raw(" switch │ "),
            key("↑/↓"),
            Span::raw(" select │ "),
            key("←/→"),
            Span::raw(" page │ "),
            key("Enter"),
            Span::raw(" details │ "),
            key("/"),
            Span::raw(" search │ "),
            key("r"),
            Span::raw(" refresh │ "),
            key("q"),
            Span::raw(" quit"),
        ],
        InputMode::Search => vec![
            key("↑/↓"),
            Span::raw(" select │ "),
            key("Enter"),
            Span::raw(" open │ "),
            key("Esc"),
            Span::raw(" close"),
        ],
        InputMode::Detail => vec![
            key("↑/↓"),
            Span::raw(" move │ "),
            key("Enter/c"),
            Span::raw(" copy / expand │ "),
            key("Tab"),
            Span::raw(" section │ "),
            key("Esc"),
            Span::raw(" close"),
        ],
    };
    spans.push(Span::raw(format!(" │ FPS {}", app.fps())));

    let w = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(c.border)),
    );
    f.render_widget(w, area);
}

// ===============================
// Overlays
// ===============================
fn centered(area: Rect, pct_w: u16, pct_h: u16) -> Rect {
    let width = (u32::from(area.width) * u32::from(pct_w) / 100) as u16;
    let height = (u32::from(area.height) * u32::from(pct_h) / 100) as u16;
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn overlay_frame<'a>(title: String, c: &ColorScheme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c.accent))
        .style(Style::default().bg(c.background))
}

fn draw_search_overlay(f: &mut Frame, app: &App, s: &Search) {
    let c = app.colors();
    let overlay = centered(f.area(), 80, 70);
    f.render_widget(Clear, overlay);
    let frame = overlay_frame(" Search transactions ".into(), c);
    let inner = frame.inner(overlay);
    f.render_widget(frame, overlay);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let input = Paragraph::new(s.text()).style(Style::default().fg(c.text)).block(
        Block::default()
            .title(" Hash or sender address ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(c.accent)),
    );
    f.render_widget(input, chunks[0]);
    if chunks[0].width > 2 {
        let typed = s.text().chars().count().min(chunks[0].width.saturating_sub(2) as usize);
        f.set_cursor_position((chunks[0].x + 1 + typed as u16, chunks[0].y + 1));
    }

    if let Some(text) = s.status_text() {
        let fg = if text == search::ERROR_TEXT { c.failure } else { c.text_dim };
        let p = Paragraph::new(text).style(Style::default().fg(fg));
        f.render_widget(p, chunks[1]);
        return;
    }

    let results = s.results();
    let items: Vec<ListItem> = results
        .iter()
        .map(|tx| {
            let kind_fg = if tx.is_message { c.message } else { c.success };
            let mut first = vec![
                Span::styled(shorten_hash(&tx.hash), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw("  "),
                Span::styled(tx_kind_label(tx.is_message), Style::default().fg(kind_fg)),
            ];
            if tx.execution_result.is_some() {
                first.push(Span::raw("  "));
                first.push(Span::styled(
                    status_label(tx.status()),
                    Style::default().fg(c.status(tx.status())),
                ));
            }
            let mut second = vec![Span::styled(
                format!("  from {}", shorten_hash(&tx.sender)),
                Style::default().fg(c.text_dim),
            )];
            if let Some(h) = tx.block_height() {
                second.push(Span::styled(format!("  Block {h}"), Style::default().fg(c.text_dim)));
            }
            if tx.status() == Some(false) {
                if let Some(msg) = tx.execution_result.as_ref().and_then(|r| r.status_message.as_ref()) {
                    second.push(Span::styled(format!("  {msg}"), Style::default().fg(c.failure)));
                }
            }
            ListItem::new(vec![Line::from(first), Line::from(second)])
        })
        .collect();

    let mut st = ListState::default();
    st.select(Some(s.selected().min(results.len().saturating_sub(1))));
    let list = List::new(items)
        .highlight_style(Style::default().bg(c.selection_bg).fg(c.selection_fg))
        .block(Block::default().title(format!(" Transactions ({}) ", results.len())));
    f.render_stateful_widget(list, chunks[1], &mut st);
}

fn draw_detail_overlay(f: &mut Frame, c: &ColorScheme, detail: &Detail) {
    let overlay = centered(f.area(), 85, 85);
    f.render_widget(Clear, overlay);
    match detail {
        Detail::Tx(d) => draw_tx_detail(f, overlay, c, d),
        Detail::Block(d) => draw_block_detail(f, overlay, c, d),
    }
}

fn field_lines(fields: &[Field], cursor: Option<usize>, c: &ColorScheme) -> Vec<Line<'static>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let value_fg = match field.value.as_str() {
                "Success" => c.success,
                "Failed" => c.failure,
                "Pending" | "Unknown" => c.pending,
                _ => c.text,
            };
            let mut spans = vec![
                Span::styled(format!("{:<18}", field.label), Style::default().fg(c.text_dim)),
                Span::styled(field.value.clone(), Style::default().fg(value_fg)),
            ];
            if field.copy.is_some() {
                spans.push(Span::styled("  ⧉", Style::default().fg(c.text_dim)));
            }
            let line = Line::from(spans);
            if cursor == Some(i) {
                line.patch_style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                line
            }
        })
        .collect()
}

fn tree_lines(rows: &[TreeRow], cursor: Option<usize>, c: &ColorScheme) -> Vec<Line<'static>> {
    render_rows(rows, &c.json)
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if cursor == Some(i) {
                line.patch_style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                line
            }
        })
        .collect()
}

/// Offset that keeps `cursor` inside a viewport of `height` lines.
fn scroll_for(cursor: usize, height: u16) -> u16 {
    let h = height.saturating_sub(2).max(1) as usize;
    cursor.saturating_sub(h - 1) as u16
}

fn draw_tx_detail(f: &mut Frame, area: Rect, c: &ColorScheme, d: &TxDetail) {
    let frame = overlay_frame(" Transaction Details ".into(), c);
    let inner = frame.inner(area);
    f.render_widget(frame, area);

    let fields = d.fields();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(fields.len() as u16 + 1), Constraint::Min(0)])
        .split(inner);

    let cursor = d.cursor();
    let field_cursor = (cursor < fields.len()).then_some(cursor);
    f.render_widget(
        Paragraph::new(field_lines(fields, field_cursor, c)).wrap(Wrap { trim: false }),
        chunks[0],
    );

    let rows = d.tree_rows();
    let tree_block = Block::default()
        .title(" State Transitions ")
        .borders(Borders::TOP)
        .border_style(Style::default().fg(c.border));
    if rows.is_empty() {
        f.render_widget(
            Paragraph::new("No state transitions")
                .style(Style::default().fg(c.text_dim))
                .block(tree_block),
            chunks[1],
        );
        return;
    }
    let tree_cursor = cursor.checked_sub(fields.len());
    let scroll = scroll_for(tree_cursor.unwrap_or(0), chunks[1].height);
    f.render_widget(
        Paragraph::new(tree_lines(&rows, tree_cursor, c))
            .block(tree_block)
            .scroll((scroll, 0)),
        chunks[1],
    );
}

fn draw_block_detail(f: &mut Frame, area: Rect, c: &ColorScheme, d: &BlockDetail) {
    let frame = overlay_frame(format!(" Block #{} ", d.block().height), c);
    let inner = frame.inner(area);
    f.render_widget(frame, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let n = d.tx_rows().len();
    let selected = BlockTab::ALL.iter().position(|t| *t == d.tab()).unwrap_or(0);
    let tabs = Tabs::new(BlockTab::ALL.iter().map(|t| t.title(n)))
        .select(selected)
        .style(Style::default().fg(c.text_dim))
        .highlight_style(Style::default().fg(c.accent).add_modifier(Modifier::BOLD))
        .divider("│")
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(c.border)),
        );
    f.render_widget(tabs, chunks[0]);

    let body = chunks[1];
    match d.tab() {
        BlockTab::Overview => {
            f.render_widget(
                Paragraph::new(field_lines(d.fields(), Some(d.cursor()), c)),
                body,
            );
        }
        BlockTab::Transactions => {
            if n == 0 {
                f.render_widget(
                    Paragraph::new("No transactions in this block").style(Style::default().fg(c.text_dim)),
                    body,
                );
                return;
            }
            let rows: Vec<Row> = d
                .tx_rows()
                .iter()
                .map(|r| {
                    Row::new(vec![
                        Span::raw(shorten_hash(&r.hash)),
                        Span::raw(r.sender.clone()),
                        Span::raw(r.nonce.clone()),
                        Span::styled(r.status, Style::default().fg(c.status(r.status_value))),
                    ])
                })
                .collect();
            let widths = [
                Constraint::Length(15),
                Constraint::Length(15),
                Constraint::Length(10),
                Constraint::Min(8),
            ];
            let table = Table::new(rows, widths)
                .header(header_row(&["Hash", "Sender", "Nonce", "Status"], c))
                .row_highlight_style(Style::default().bg(c.selection_bg).fg(c.selection_fg));
            let mut st = TableState::default().with_selected(Some(d.cursor()));
            f.render_stateful_widget(table, body, &mut st);
        }
        BlockTab::StateChanges => {
            let rows = d.tree_rows();
            if rows.is_empty() {
                f.render_widget(
                    Paragraph::new("No state changes recorded for this block")
                        .style(Style::default().fg(c.text_dim)),
                    body,
                );
                return;
            }
            let scroll = scroll_for(d.cursor(), body.height.saturating_add(2));
            f.render_widget(
                Paragraph::new(tree_lines(&rows, Some(d.cursor()), c)).scroll((scroll, 0)),
                body,
            );
        }
    }
}

fn draw_toast(f: &mut Frame, app: &App) {
    let c = app.colors();
    let message = app.toast_message().unwrap_or("");

    let area = f.area();
    let width = (message.chars().count() as u16 + 6).min(area.width);
    let overlay = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(4),
        width,
        height: 3.min(area.height),
    };
    f.render_widget(Clear, overlay);

    let text = Paragraph::new(format!("✓ {message}"))
        .style(Style::default().fg(c.toast).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(c.toast)),
        );
    f.render_widget(text, overlay);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_fits() {
        let outer = Rect::new(0, 0, 100, 40);
        let r = centered(outer, 80, 50);
        assert_eq!((r.width, r.height), (80, 20));
        assert_eq!((r.x, r.y), (10, 10));
    }

    #[test]
    fn centered_rect_on_very_wide_terminal() {
        let outer = Rect::new(0, 0, 1000, 300);
        let r = centered(outer, 85, 85);
        assert_eq!((r.width, r.height), (850, 255));
        assert_eq!((r.x, r.y), (75, 22));
    }

    #[test]
    fn scroll_keeps_cursor_visible() {
        assert_eq!(scroll_for(0, 10), 0);
        assert_eq!(scroll_for(7, 10), 0);
        assert_eq!(scroll_for(8, 10), 1);
        assert_eq!(scroll_for(20, 10), 13);
    }
}
