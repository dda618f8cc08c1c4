/// Ratatui-based TUI for Courser.
///
/// Architecture:
///   main thread:  event loop — crossterm keyboard events + mpsc UiEvent drain
///   fetch task:   tokio::spawn — the single in-flight generation; its result
///                 comes back tagged with the ticket it was issued under, and
///                 the controller discards it if the ticket has gone stale
///
/// Screens:
///   prompt — topic input (first run, or [n] for a new topic)
///   loading — spinner while a generation is outstanding
///   course — scrollable course + branch/deeper/back footer
pub mod render;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::client::GenerateClient;
use crate::config::ResolvedConfig;
use crate::course::Course;
use crate::session::{Dispatch, PendingRequest, SessionController};

// ── UiEvent — typed events from fetch task → TUI ─────────────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// Outcome of a generation request, tagged with the ticket it was
    /// issued under
    Generated { ticket: u64, result: Result<Course, String> },
}

// ── Input limits ──────────────────────────────────────────────────────────────

/// Prompt length cap, enforced here in the UI (the engine doesn't care).
const MAX_PROMPT_CHARS: usize = 400;

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub session: SessionController,
    pub client: Arc<GenerateClient>,
    pub input: String,
    pub cursor: usize, // byte offset in input
    /// Lines scrolled down in the course body
    pub scroll: u16,
    /// Incremented every 120ms while Loading, for the spinner
    pub spinner_tick: u32,
    /// True while the topic input is shown over an existing course ([n])
    pub entering_topic: bool,
    pub profile: String,
    pub endpoint: String,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig, client: Arc<GenerateClient>) -> Self {
        Self {
            session: SessionController::new(resolved.default_topic.clone()),
            client,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            spinner_tick: 0,
            entering_topic: false,
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
        }
    }

    /// Which screen to draw, derived from controller phase + local UI state.
    pub fn screen(&self) -> Screen {
        if self.session.is_loading() {
            return Screen::Loading;
        }
        if self.entering_topic || self.session.current().is_none() {
            return Screen::Prompt;
        }
        Screen::Course
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Prompt,
    Loading,
    Course,
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, resolved).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    resolved: ResolvedConfig,
) -> Result<()> {
    let mut client = GenerateClient::new(resolved.endpoint.clone(), resolved.timeout_secs)?;
    if let Some(key) = &resolved.api_key {
        client.set_api_key(key.clone());
    }
    let mut state = AppState::new(&resolved, Arc::new(client));

    // Channel: fetch task → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Spinner tick ──────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.session.is_loading() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Generation outcomes ───────────────────────────────────────────
            Some(UiEvent::Generated { ticket, result }) = ui_rx.recv() => {
                if state.session.resolve(ticket, result) {
                    state.scroll = 0;
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        if !handle_key(key, &mut state, &ui_tx) {
                            break;
                        }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}

// ── Dispatch plumbing ─────────────────────────────────────────────────────────

/// Run a cache-miss request on a task. No cancellation signal is ever sent;
/// a superseded request simply resolves into a stale ticket and is dropped.
fn spawn_fetch(
    client: Arc<GenerateClient>,
    req: PendingRequest,
    tx: mpsc::UnboundedSender<UiEvent>,
) {
    tokio::spawn(async move {
        let result = client.generate(&req.prompt).await.map_err(|e| e.to_string());
        let _ = tx.send(UiEvent::Generated { ticket: req.ticket, result });
    });
}

fn apply_dispatch(state: &mut AppState, dispatch: Dispatch, tx: &mpsc::UnboundedSender<UiEvent>) {
    match dispatch {
        Dispatch::Ready => {
            // Cache hit — already applied, just land on the new node
            state.scroll = 0;
        }
        Dispatch::Fetch(req) => spawn_fetch(state.client.clone(), req, tx.clone()),
        Dispatch::Ignored => {}
    }
}

// ── Key handler ───────────────────────────────────────────────────────────────

/// Returns false when the app should exit.
fn handle_key(key: KeyEvent, state: &mut AppState, tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    // Ctrl+C always quits
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return false;
    }

    match state.screen() {
        Screen::Prompt => handle_prompt_key(key, state, tx),
        Screen::Loading => handle_loading_key(key, state),
        Screen::Course => handle_course_key(key, state, tx),
    }
}

fn handle_prompt_key(
    key: KeyEvent,
    state: &mut AppState,
    tx: &mpsc::UnboundedSender<UiEvent>,
) -> bool {
    match key.code {
        KeyCode::Enter => {
            let topic = state.input.trim().to_string();
            if !topic.is_empty() {
                state.entering_topic = false;
                let dispatch = state.session.start(&topic);
                apply_dispatch(state, dispatch, tx);
            }
        }
        KeyCode::Esc => {
            // Abandon the new-topic input and return to the current course
            if state.session.current().is_some() {
                state.entering_topic = false;
                state.input.clear();
                state.cursor = 0;
            }
        }
        KeyCode::Char(c) => {
            if state.input.chars().count() < MAX_PROMPT_CHARS {
                state.input.insert(state.cursor, c);
                state.cursor += c.len_utf8();
            }
        }
        KeyCode::Backspace => {
            if state.cursor > 0 {
                let prev = state.input[..state.cursor]
                    .chars()
                    .next_back()
                    .map(|c| c.len_utf8())
                    .unwrap_or(0);
                state.cursor -= prev;
                state.input.remove(state.cursor);
            }
        }
        KeyCode::Left => {
            if state.cursor > 0 {
                let prev = state.input[..state.cursor]
                    .chars()
                    .next_back()
                    .map(|c| c.len_utf8())
                    .unwrap_or(0);
                state.cursor -= prev;
            }
        }
        KeyCode::Right => {
            if state.cursor < state.input.len() {
                let next = state.input[state.cursor..]
                    .chars()
                    .next()
                    .map(|c| c.len_utf8())
                    .unwrap_or(0);
                state.cursor += next;
            }
        }
        KeyCode::Home => state.cursor = 0,
        KeyCode::End => state.cursor = state.input.len(),
        _ => {}
    }
    true
}

fn handle_loading_key(key: KeyEvent, state: &mut AppState) -> bool {
    match key.code {
        // back() supersedes the in-flight request; its late result will
        // arrive with a stale ticket and be discarded
        KeyCode::Char('b') | KeyCode::Backspace => {
            if state.session.back() {
                state.scroll = 0;
            }
        }
        KeyCode::Char('q') => return false,
        _ => {}
    }
    true
}

fn handle_course_key(
    key: KeyEvent,
    state: &mut AppState,
    tx: &mpsc::UnboundedSender<UiEvent>,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return false,

        // ── Branch choices (match on the choice key, typically '1'/'2') ──────
        KeyCode::Char(c @ '1'..='9') => {
            let choice = state
                .session
                .current_course()
                .and_then(|course| {
                    course.choices.iter().find(|ch| ch.key == c.to_string()).cloned()
                });
            if let Some(choice) = choice {
                let dispatch = state.session.select_branch(&choice);
                apply_dispatch(state, dispatch, tx);
            }
        }

        KeyCode::Char('d') => {
            let dispatch = state.session.deepen();
            apply_dispatch(state, dispatch, tx);
        }

        KeyCode::Char('b') | KeyCode::Backspace | KeyCode::Left => {
            if state.session.back() {
                state.scroll = 0;
            }
        }

        KeyCode::Char('n') => {
            state.entering_topic = true;
            state.input.clear();
            state.cursor = 0;
        }

        // ── Scrolling ─────────────────────────────────────────────────────────
        KeyCode::Up => state.scroll = state.scroll.saturating_sub(1),
        KeyCode::Down => state.scroll = state.scroll.saturating_add(1),
        KeyCode::PageUp => state.scroll = state.scroll.saturating_sub(10),
        KeyCode::PageDown => state.scroll = state.scroll.saturating_add(10),
        KeyCode::Home => state.scroll = 0,

        _ => {}
    }
    true
}
