//! App: component-based event loop.
//!
//! - `App` owns the components and `AppState`.
//! - Background tasks reach the UI only through the redraw queue; the loop is
//!   its single consumer and folds each `DisplayUpdate` into `AppState`.
//! - Keys come from a blocking reader thread over an mpsc channel.
//! - Components return `Vec<Action>`; the App dispatches them to the
//!   controller.

use std::io;
use std::time::Duration;

use navi_proto::config::KeyBindings;
use navi_proto::protocol::VolumeLevel;
use ratatui::crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    action::{map_key, Action},
    app_state::AppState,
    component::Component,
    components::{now_playing::NowPlaying, track_table::TrackTable},
    controller::PlaybackController,
    display::{DisplayUpdate, NoticeLevel},
    theme::{style_unfocused_border, C_BG, C_ERROR, C_MUTED},
    widgets::{
        progress_bar::draw_transport,
        search_input::{SearchAction, SearchInput},
        toast::ToastManager,
    },
};

/// Upper bound on queued updates folded in before the next frame.
const MAX_DRAIN: usize = 256;
const INPUT_POLL: Duration = Duration::from_millis(200);

enum InputMessage {
    Key(KeyEvent),
    Resize,
}

pub struct App {
    state: AppState,
    controller: PlaybackController,
    track_table: TrackTable,
    now_playing: NowPlaying,
    search: SearchInput,
    toast: ToastManager,
    updates: mpsc::Receiver<DisplayUpdate>,
    cancel: CancellationToken,
    should_quit: bool,
}

impl App {
    pub fn new(
        controller: PlaybackController,
        keys: KeyBindings,
        initial_volume: f64,
        updates: mpsc::Receiver<DisplayUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        let state = AppState::new(
            controller.catalog().clone(),
            keys,
            VolumeLevel::Percent(initial_volume),
        );
        Self {
            state,
            controller,
            track_table: TrackTable::new(),
            now_playing: NowPlaying::new(),
            search: SearchInput::default(),
            toast: ToastManager::new(),
            updates,
            cancel,
            should_quit: false,
        }
    }

    /// Take over the terminal until quit or cancellation, then restore it.
    pub async fn run(mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("terminal ready, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal).await;

        // Restore even if the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let (input_tx, mut input_rx) = mpsc::channel::<InputMessage>(64);
        let reader_cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || read_input(input_tx, reader_cancel));

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("app loop cancelled");
                    break;
                }

                Some(update) = self.updates.recv() => {
                    self.handle_update(update);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        match self.updates.try_recv() {
                            Ok(next) => self.handle_update(next),
                            Err(_) => break,
                        }
                        drained += 1;
                    }
                    needs_redraw = true;
                }

                Some(input) = input_rx.recv() => {
                    if let InputMessage::Key(key) = input {
                        for action in self.handle_key(key) {
                            self.dispatch(action);
                        }
                    }
                    needs_redraw = true;
                }

                _ = ui_tick.tick() => {
                    if !self.toast.is_empty() {
                        self.toast.tick();
                        needs_redraw = true;
                    }
                }
            }
        }

        // Stops the poller, notifier and input reader
        self.cancel.cancel();
        Ok(())
    }

    fn handle_update(&mut self, update: DisplayUpdate) {
        self.state.apply(&update);
        if let DisplayUpdate::Notice { level, text } = update {
            self.toast.push(text, level);
        }
        self.track_table.on_update(&self.state);
        self.now_playing.on_update(&self.state);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        // The search overlay captures every key while open
        if self.state.search.is_active() {
            return match self.search.handle_key(key) {
                SearchAction::Submit(query) => vec![Action::Search(query)],
                SearchAction::Cancelled => vec![Action::CancelSearch],
                SearchAction::None => Vec::new(),
            };
        }

        if let Some(action) = map_key(key, &self.state.keys) {
            return vec![action];
        }
        self.track_table.handle_key(key, &self.state)
    }

    /// Controller calls hand back join handles; the UI path never waits on them.
    fn dispatch(&mut self, action: Action) {
        debug!("dispatch {:?}", action);
        match action {
            Action::PlayRow(row) => {
                let _ = self.controller.select_row(row);
            }
            Action::TogglePause => {
                let _ = self.controller.toggle_pause();
            }
            Action::Next => {
                let _ = self.controller.next();
            }
            Action::Previous => {
                let _ = self.controller.previous();
            }
            Action::VolumeUp => {
                let _ = self.controller.volume_up();
            }
            Action::VolumeDown => {
                let _ = self.controller.volume_down();
            }
            Action::ToggleMute => {
                let _ = self.controller.toggle_mute();
            }
            Action::NextPage => {
                self.controller.turn_page(true);
            }
            Action::PrevPage => {
                self.controller.turn_page(false);
            }
            Action::Reload => {
                self.toast.push("reloading catalog…", NoticeLevel::Info);
                let _ = self.controller.reload_catalog();
            }
            Action::OpenSearch => {
                self.search.clear();
                self.state.search.set(true);
            }
            Action::Search(query) => {
                self.state.search.set(false);
                self.controller.search(&query);
            }
            Action::CancelSearch => self.state.search.set(false),
            Action::Quit => {
                info!("quit requested");
                self.should_quit = true;
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        // ── Outer layout: panels | transport ─────────────────────────────────
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(area);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(outer[0]);

        self.now_playing.draw(frame, body[0], false, &self.state);
        self.track_table
            .draw(frame, body[1], !self.state.search.is_active(), &self.state);
        self.draw_transport_strip(frame, outer[1]);

        if self.state.search.is_active() {
            self.search.draw(frame, area);
        }

        // ── Toast notifications (topmost layer) ──────────────────────────────
        self.toast.draw(frame, area);
    }

    /// Bordered transport line; the newest warning or error rides in the
    /// bottom border.
    fn draw_transport_strip(&self, frame: &mut Frame, area: Rect) {
        let mut block = Block::bordered().border_style(style_unfocused_border());
        if let Some(line) = self.state.log_lines.back() {
            let color = if line.contains("[ERROR]") { C_ERROR } else { C_MUTED };
            block = block.title_bottom(Line::from(Span::styled(
                format!(" {} ", line),
                Style::default().fg(color),
            )));
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);
        draw_transport(frame, inner, &self.state.transport, self.state.volume);
    }
}

/// Blocking key reader.  Polls so it can notice cancellation.
fn read_input(tx: mpsc::Sender<InputMessage>, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        match event::poll(INPUT_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                debug!("input poll failed: {}", e);
                break;
            }
        }
        let message = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => InputMessage::Key(key),
            Ok(Event::Resize(..)) => InputMessage::Resize,
            Ok(_) => continue,
            Err(e) => {
                debug!("input read failed: {}", e);
                break;
            }
        };
        if tx.blocking_send(message).is_err() {
            break;
        }
    }
    debug!("input reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use navi_proto::protocol::PlaybackStatus;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn app(h: &Harness) -> App {
        let (_tx, rx) = mpsc::channel(8);
        App::new(
            h.controller.clone(),
            KeyBindings::default(),
            50.0,
            rx,
            CancellationToken::new(),
        )
    }

    fn press(app: &mut App, code: KeyCode) {
        for action in app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)) {
            app.dispatch(action);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enter_plays_selected_row() {
        let h = Harness::new(3);
        let mut app = app(&h);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(h.session.status(), PlaybackStatus::Loading(1));
    }

    #[tokio::test]
    async fn test_escape_closes_search_before_quitting() {
        let h = Harness::new(3);
        let mut app = app(&h);
        press(&mut app, KeyCode::Char('/'));
        assert!(app.state.search.is_active());

        press(&mut app, KeyCode::Esc);
        assert!(!app.state.search.is_active());
        assert!(!app.should_quit);

        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_search_overlay_swallows_bound_keys() {
        let h = Harness::new(12);
        let mut app = app(&h);
        press(&mut app, KeyCode::Char('/'));
        for c in "title 11".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert_eq!(h.session.status(), PlaybackStatus::Idle);

        press(&mut app, KeyCode::Enter);
        assert!(!app.state.search.is_active());
        assert_eq!(h.catalog.read().len(), 1);
    }

    #[tokio::test]
    async fn test_notice_becomes_toast() {
        let h = Harness::new(1);
        let mut app = app(&h);
        app.handle_update(DisplayUpdate::Notice {
            level: NoticeLevel::Warning,
            text: "No results found for: x".to_string(),
        });
        assert_eq!(app.toast.len(), 1);
    }
}
