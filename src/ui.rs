use std::io::{self, Stdout};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use ratatui::{Frame, Terminal};

use crate::data::CastService;
use crate::farcaster::CastGroup;
use crate::format::BlockRenderer;
use crate::history::Location;
use crate::nav::{Effect, Intent, Navigator};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const HELP_TEXT: &str = "↑/↓ move • enter/→ open • ←/esc back • q quit";
const STATUS_BAR_HEIGHT: u16 = 1;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_STATUS_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

enum AsyncResponse {
    Load {
        request_id: u64,
        location: Location,
        result: Result<CastGroup>,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Options {
    pub start: Location,
    pub service: Arc<dyn CastService>,
    pub renderer: Box<dyn BlockRenderer + Send>,
    pub history_size: usize,
    pub count: usize,
}

pub struct Model {
    nav: Navigator,
    service: Arc<dyn CastService>,
    count: usize,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    pending_request: Option<u64>,
    spinner: Spinner,
    status_message: String,
    status_is_error: bool,
    needs_redraw: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            nav: Navigator::new(opts.start, opts.renderer, opts.history_size, 0),
            service: opts.service,
            count: opts.count,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending_request: None,
            spinner: Spinner::new(),
            status_message: String::new(),
            status_is_error: false,
            needs_redraw: true,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.start(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn start(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let size = terminal.size()?;
        self.nav.resize(viewport_height(size.height));
        let effect = self.nav.start();
        self.apply(effect);
        self.event_loop(terminal)
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Resize(_, height) => {
                        self.nav.resize(viewport_height(height));
                        self.mark_dirty();
                    }
                    _ => {}
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let Some(intent) = intent_for(key) else {
            return false;
        };
        if !matches!(intent, Intent::Quit) {
            self.clear_status();
        }
        let effect = self.nav.handle(intent);
        self.apply(effect)
    }

    fn apply(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::Unchanged => {}
            Effect::Render => self.mark_dirty(),
            Effect::Load(location) => self.spawn_load(location),
            Effect::OpenExternal(url) => self.open_external(&url),
            Effect::Busy => self.set_status("Still loading, please wait…", false),
            Effect::AtRoot => self.set_status("Already at the first view.", false),
            Effect::Quit => return true,
        }
        false
    }

    fn spawn_load(&mut self, location: Location) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_request = Some(request_id);
        self.spinner.reset();
        self.mark_dirty();
        tracing::info!(%location, request_id, "load issued");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let count = self.count;
        thread::spawn(move || {
            let result = fetch_location(service.as_ref(), location, count);
            let _ = tx.send(AsyncResponse::Load {
                request_id,
                location,
                result,
            });
        });
    }

    fn open_external(&mut self, url: &str) {
        match webbrowser::open(url) {
            Ok(_) => self.set_status(format!("Opened {url} in your browser."), false),
            Err(err) => {
                tracing::warn!(url, error = %err, "open in browser failed");
                self.set_status(format!("Failed to open {url}: {err}"), true);
            }
        }
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Load {
                request_id,
                location,
                result,
            } => {
                if self.pending_request != Some(request_id) {
                    tracing::debug!(request_id, "dropping stale load response");
                    return;
                }
                self.pending_request = None;
                match self.nav.complete(result) {
                    Ok(()) => {
                        tracing::info!(%location, blocks = self.nav.viewport().len(), "load completed");
                        if self.nav.viewport().is_empty() {
                            self.set_status(format!("Nothing to show for {location}."), false);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%location, error = %format!("{err:#}"), "load failed");
                        self.set_status(format!("Error: {err:#}"), true);
                    }
                }
                self.mark_dirty();
            }
        }
    }

    fn is_loading(&self) -> bool {
        self.nav.is_loading()
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = message.into();
        self.status_is_error = is_error;
        self.mark_dirty();
    }

    fn clear_status(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    fn status_text(&self) -> String {
        if let Some(location) = self.nav.pending_location() {
            return format!("{} Loading {location}…", self.spinner.frame());
        }
        if !self.status_message.is_empty() {
            return self.status_message.clone();
        }
        let focus = self.nav.focus();
        if focus.is_focused() {
            let targets = focus.targets();
            return match focus.target() {
                Some(target) => {
                    let position = targets
                        .iter()
                        .position(|candidate| candidate == target)
                        .unwrap_or(0);
                    format!(
                        "→ {} ({}/{}) • enter open • ↑/↓ cycle • esc unfocus",
                        target.label(&self.nav.group().fnames),
                        position + 1,
                        targets.len()
                    )
                }
                None => "Nothing to open in this cast • esc unfocus".to_string(),
            };
        }
        match self.nav.current_location() {
            Some(location) => format!("{location} • {HELP_TEXT}"),
            None => HELP_TEXT.to_string(),
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(STATUS_BAR_HEIGHT)])
            .split(full);

        let focused = self.nav.focus().is_focused();
        let lines: Vec<Line<'_>> = self
            .nav
            .viewport()
            .render()
            .into_iter()
            .map(|line| {
                let style = match (line.selected, focused) {
                    (true, true) => Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                    (true, false) => Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                    (false, _) => Style::default().fg(COLOR_TEXT_SECONDARY),
                };
                Line::from(Span::styled(line.text, style))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), layout[0]);

        let status_fg = if self.status_is_error {
            COLOR_ERROR
        } else {
            COLOR_TEXT_PRIMARY
        };
        let status_line = Paragraph::new(self.status_text())
            .style(Style::default().fg(status_fg).bg(COLOR_STATUS_BG));
        frame.render_widget(status_line, layout[1]);
    }
}

// A panic becomes an error so the pending load always completes.
fn fetch_location(service: &dyn CastService, location: Location, count: usize) -> Result<CastGroup> {
    match panic::catch_unwind(AssertUnwindSafe(|| service.fetch(location, count))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|msg| msg.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%location, %reason, "load panicked");
            Err(anyhow!("load of {location} panicked: {reason}"))
        }
    }
}

fn viewport_height(terminal_height: u16) -> usize {
    terminal_height.saturating_sub(STATUS_BAR_HEIGHT) as usize
}

fn intent_for(key: KeyEvent) -> Option<Intent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Intent::Quit),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('q') => Some(Intent::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Intent::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Intent::Down),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(Intent::Activate),
        KeyCode::Left | KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => {
            Some(Intent::Back)
        }
        KeyCode::Char('r') => Some(Intent::Reload),
        _ => None,
    }
}
