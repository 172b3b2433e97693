// Native binary for ProtoScope - terminal explorer for a GraphQL sequencer

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use protoscope::{
    app::{App, InputMode},
    clipboard,
    config::load,
    graphql::HttpTransport,
    query_cache::QueryCache,
    types::AppEvent,
    ui,
};

/// The terminal owns stdout, so logs go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();

    let cfg = load().context("Failed to load configuration")?;
    init_logging(&cfg.log_file)?;
    cfg.log_summary();

    let transport = HttpTransport::new(cfg.graphql_url.clone(), cfg.request_timeout());
    let cache = QueryCache::new(Arc::new(transport));

    // terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // app + channels
    let (tx, rx) = unbounded_channel::<AppEvent>();
    let mut app = App::new(&cfg, cache, Some(tx));

    // main loop
    let result = run_loop(&mut app, &mut terminal, rx).await;

    // cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    log::info!("exiting");
    result
}

async fn run_loop(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut rx: UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut last_frame = Instant::now();
    let frame_ms = 1000u32.saturating_div(app.fps().max(1)) as u64;
    let budget = Duration::from_millis(frame_ms.max(1));

    loop {
        // frame budget (coalesced renders)
        let wait = budget.saturating_sub(last_frame.elapsed());

        if event::poll(wait)? {
            if let Event::Key(k) = event::read()? {
                if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                    handle_key(app, k);
                }
            }
        }
        while let Ok(ev) = rx.try_recv() {
            app.on_event(ev);
        }
        app.tick();

        // Relative timestamps age even without new data, so redraw on the
        // frame budget as well as on change.
        if app.take_dirty() || last_frame.elapsed() >= budget {
            terminal.draw(|f| ui::draw(f, app))?;
            last_frame = Instant::now();
        }
        if app.quit_flag() {
            break;
        }
    }
    Ok(())
}

fn copy(app: &mut App, text: String) {
    if clipboard::copy_to_clipboard(&text) {
        app.show_toast("Copied!");
    } else {
        app.show_toast("Clipboard unavailable");
    }
}

fn handle_key(app: &mut App, k: KeyEvent) {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && k.code == KeyCode::Char('c') {
        app.on_event(AppEvent::Quit);
        return;
    }

    match app.input_mode() {
        InputMode::Search => match k.code {
            KeyCode::Esc => app.close_search(),
            KeyCode::Enter => app.search_open_selected(),
            KeyCode::Up => app.up(),
            KeyCode::Down => app.down(),
            KeyCode::Backspace => app.search_backspace(),
            KeyCode::Char(c) if !ctrl => app.search_add_char(c),
            _ => {}
        },
        InputMode::Detail => match k.code {
            KeyCode::Esc | KeyCode::Char('q') => app.close_detail(),
            KeyCode::Up | KeyCode::Char('k') => app.up(),
            KeyCode::Down | KeyCode::Char('j') => app.down(),
            KeyCode::Tab | KeyCode::Right => app.detail_next_tab(),
            KeyCode::Enter | KeyCode::Char('c') | KeyCode::Char(' ') => {
                if let Some(text) = app.detail_activate() {
                    copy(app, text);
                }
            }
            _ => {}
        },
        InputMode::Normal => match k.code {
            KeyCode::Char('q') => app.on_event(AppEvent::Quit),
            KeyCode::Char('f') if ctrl => app.start_search(),
            KeyCode::Char('/') => app.start_search(),
            KeyCode::Char('r') => app.refresh(),
            KeyCode::Tab => app.next_tab(),
            KeyCode::BackTab => app.prev_tab(),
            KeyCode::Up | KeyCode::Char('k') => app.up(),
            KeyCode::Down | KeyCode::Char('j') => app.down(),
            KeyCode::Left | KeyCode::PageUp | KeyCode::Char('h') => app.prev_page(),
            KeyCode::Right | KeyCode::PageDown | KeyCode::Char('l') => app.next_page(),
            KeyCode::Home => app.first_page(),
            KeyCode::End => app.last_page(),
            KeyCode::Enter => app.open_selected(),
            _ => {}
        },
    }
}
