//! App: component-based event loop.
//!
//! - `App` owns the components and `AppState` (read-only data for components).
//! - A `tokio::mpsc` channel carries terminal input and core events in.
//! - Components return `Vec<Action>`; App dispatches each Action and turns
//!   payload actions into `Controller` calls.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use payload_proto::{Controller, CoreEvent};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{header, help_overlay::HelpOverlay, payload_list::PayloadList},
    theme::C_BG,
    widgets::{
        status_bar::{self, InputMode},
        toast::ToastManager,
    },
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Core(CoreEvent),
}

pub struct App {
    controller: Arc<Controller>,
    state: AppState,
    payload_list: PayloadList,
    help_overlay: HelpOverlay,
    toast: ToastManager,
    /// Last-drawn list rect, for mouse hit-testing.
    list_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(
        controller: Arc<Controller>,
        receiver_url: String,
        source: String,
        toast_duration: Duration,
    ) -> Self {
        let catalog = Arc::new(controller.catalog().clone());
        Self {
            controller,
            state: AppState::new(catalog, receiver_url, source),
            payload_list: PayloadList::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(toast_duration),
            list_area: Rect::default(),
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self, core_rx: broadcast::Receiver<CoreEvent>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal, core_rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        mut core_rx: broadcast::Receiver<CoreEvent>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(ev) = event::read() {
                if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                    break;
                }
            }
        });

        // ── Background task: core notices and state changes ───────────────────
        let core_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match core_rx.recv().await {
                    Ok(evt) => {
                        if core_tx.send(AppMessage::Core(evt)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("core receiver lagged by {} events", n);
                        // A refresh covers whatever state change was skipped.
                        if core_tx
                            .send(AppMessage::Core(CoreEvent::StateChanged))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Toast expiry check
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        self.refresh_core().await;
        info!("payloader ui ready, {} payloads", self.state.catalog.len());

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
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        match rx.try_recv() {
                            Ok(next) => self.handle_message(next).await,
                            Err(_) => break,
                        }
                        drained += 1;
                    }
                    needs_redraw = true;
                }

                _ = toast_tick.tick() => {
                    needs_redraw = self.toast.tick();
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return;
                    }
                    for a in self.handle_key(key) {
                        self.dispatch(a).await;
                    }
                }
                Event::Mouse(mouse) => {
                    for a in self.handle_mouse(mouse) {
                        self.dispatch(a).await;
                    }
                }
                Event::Resize(w, h) => {
                    self.dispatch(Action::Resize(w, h)).await;
                }
                _ => {}
            },

            AppMessage::Core(CoreEvent::Notice(notice)) => {
                trace!("notice: {:?}", notice);
                self.toast.notice(notice);
            }

            AppMessage::Core(CoreEvent::StateChanged) => {
                self.refresh_core().await;
            }
        }
    }

    async fn refresh_core(&mut self) {
        self.state.core = self.controller.snapshot().await;
        self.payload_list.refresh(&self.state);
    }

    // ── Input ────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        let normal = self.state.input_mode == InputMode::Normal;
        match key.code {
            KeyCode::Char('c') if key.modifiers == KeyModifiers::CONTROL => {
                return vec![Action::Quit];
            }
            KeyCode::Char('q') if normal && !self.help_overlay.visible => {
                return vec![Action::Quit];
            }
            KeyCode::Char('?') if normal => return vec![Action::ToggleHelp],
            _ => {}
        }

        // Help overlay captures all keys when visible
        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }

        if normal && key.code == KeyCode::Esc && !self.payload_list.query().is_empty() {
            return vec![Action::ClearFilter];
        }

        self.payload_list.handle_key(key, &self.state)
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if self.help_overlay.visible {
            return vec![];
        }
        let area = self.list_area;
        let inside = event.column >= area.x
            && event.column < area.x + area.width
            && event.row >= area.y
            && event.row < area.y + area.height;
        if !inside {
            return vec![];
        }
        self.payload_list.handle_mouse(event, area, &self.state)
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        // Components react first, then the app handles the action.
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.payload_list.on_action(&action, s));
            out.extend(self.help_overlay.on_action(&action, s));
            out
        };

        self.apply_action(action).await;

        for a in secondary {
            self.apply_action(a).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        match &action {
            Action::FilterChanged(_) | Action::Resize(..) => trace!("apply_action: {:?}", action),
            _ => debug!("apply_action: {:?}", action),
        }
        match action {
            Action::Send(name) => {
                // The transfer runs on its own task; its outcome arrives as
                // core events.
                let _transfer = self.controller.select_and_send(&name).await;
                self.refresh_core().await;
            }
            Action::ToggleFavorite(name) => {
                let written = self.controller.toggle_favorite(&name).await;
                if let Err(e) = &written.persisted {
                    warn!("favorite change for {} kept in memory only: {}", name, e);
                }
                self.refresh_core().await;
            }
            Action::OpenFilter => {
                self.state.input_mode = InputMode::Filter;
            }
            Action::CloseFilter | Action::ClearFilter => {
                self.state.input_mode = InputMode::Normal;
            }
            Action::FilterChanged(_) => {}
            Action::ToggleLayout => {
                self.state.layout = self.state.layout.toggle();
                self.toast.push(
                    format!("layout: {}", self.state.layout.label()),
                    crate::widgets::toast::Severity::Info,
                );
            }
            Action::ToggleHelp => {}
            Action::Quit => {
                info!("quit requested");
                self.should_quit = true;
            }
            Action::Resize(..) => {}
        }
    }

    // ── Draw ─────────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();

        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        // header | separator | body | keys bar
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        header::draw(frame, outer[0], &self.state);
        status_bar::draw_separator(frame, outer[1]);

        self.list_area = outer[2];
        self.payload_list
            .draw(frame, outer[2], !self.help_overlay.visible, &self.state);

        status_bar::draw_keys_bar(
            frame,
            outer[3],
            self.state.input_mode,
            &self.state.core.dispatch,
        );

        if self.help_overlay.visible {
            self.help_overlay.draw(frame, area, false, &self.state);
        }

        // Toast notifications (topmost layer)
        self.toast.draw(frame, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payload_proto::dispatch::{HttpReceiver, LocalDirSource};
    use payload_proto::{
        Catalog, DispatchEngine, MemoryBackend, Notice, NoticeLevel, Notifier, StateStore,
    };
    use ratatui::crossterm::event::KeyEvent;

    async fn app() -> App {
        let dir = tempfile::TempDir::new().unwrap();
        let notifier = Notifier::default();
        let store = Arc::new(StateStore::open(Arc::new(MemoryBackend::new())).await);
        let client = reqwest::Client::new();
        let engine = Arc::new(DispatchEngine::new(
            Arc::new(LocalDirSource::new(dir.path())),
            Arc::new(HttpReceiver::new(client, "http://127.0.0.1:9/")),
            store.clone(),
            notifier.clone(),
        ));
        let controller = Arc::new(Controller::new(
            Arc::new(Catalog::builtin()),
            engine,
            store,
            notifier,
        ));
        App::new(
            controller,
            "http://127.0.0.1:9/".to_string(),
            dir.path().display().to_string(),
            Duration::from_secs(3),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn press(app: &mut App, code: KeyCode) {
        app.handle_message(AppMessage::Event(Event::Key(key(code))))
            .await;
    }

    #[tokio::test]
    async fn core_notice_lands_in_toast() {
        let mut app = app().await;
        app.handle_message(AppMessage::Core(CoreEvent::Notice(Notice::new(
            "x.bin added to favorites",
            NoticeLevel::Success,
        ))))
        .await;
        assert_eq!(
            app.toast.message().map(|(m, _)| m),
            Some("x.bin added to favorites")
        );
    }

    #[tokio::test]
    async fn favorite_key_updates_badges() {
        let mut app = app().await;
        press(&mut app, KeyCode::Char('*')).await;
        let first = app.state.catalog.list_all()[0].name.clone();
        assert_eq!(app.state.core.state.favorites, vec![first.clone()]);
        assert!(app.state.core.state.is_favorite(&first));
        press(&mut app, KeyCode::Char('f')).await;
        assert!(app.state.core.state.favorites.is_empty());
    }

    #[tokio::test]
    async fn filter_mode_swallows_quit() {
        let mut app = app().await;
        press(&mut app, KeyCode::Char('/')).await;
        assert_eq!(app.state.input_mode, InputMode::Filter);
        press(&mut app, KeyCode::Char('q')).await;
        assert!(!app.should_quit);
        assert_eq!(app.payload_list.query(), "q");
        press(&mut app, KeyCode::Enter).await;
        assert_eq!(app.state.input_mode, InputMode::Normal);
        press(&mut app, KeyCode::Char('q')).await;
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn help_overlay_toggles_and_blocks_list() {
        let mut app = app().await;
        press(&mut app, KeyCode::Char('?')).await;
        assert!(app.help_overlay.visible);
        press(&mut app, KeyCode::Char('*')).await;
        assert!(app.state.core.state.favorites.is_empty());
        press(&mut app, KeyCode::Esc).await;
        assert!(!app.help_overlay.visible);
    }

    #[tokio::test]
    async fn send_marks_selection_immediately() {
        let mut app = app().await;
        press(&mut app, KeyCode::Enter).await;
        let first = app.state.catalog.list_all()[0].name.clone();
        assert_eq!(app.state.core.selected.as_deref(), Some(first.as_str()));
        assert_eq!(app.state.core.dispatch.active.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn v_toggles_layout() {
        let mut app = app().await;
        press(&mut app, KeyCode::Char('v')).await;
        assert_eq!(app.state.layout, crate::action::ListLayout::Detailed);
    }
}
