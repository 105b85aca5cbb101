//! PayloadList component: the main pane.
//!
//! Rows come from `view::project` over the catalog and the latest core
//! snapshot, so badges always reflect persisted state.

use std::time::Instant;

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph},
    Frame,
};

use payload_proto::view::{project, PayloadView};
use payload_proto::DispatchPhase;

use crate::{
    action::{Action, ListLayout},
    app_state::AppState,
    component::Component,
    theme::{
        C_ACCENT, C_FAVORITE, C_MUTED, C_PRIMARY, C_RECENT, C_SECONDARY, C_SELECTION_BG,
        C_SENDING, C_SENT, C_SIZE,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        scrollable_list::ScrollableList,
    },
};

const DOUBLE_CLICK_MS: u128 = 400;

pub struct PayloadList {
    list: ScrollableList<String>,
    pub filter_input: FilterInput,
    query: String,
    /// Last click (row index, time) for double-click detection.
    last_click: Option<(usize, Instant)>,
}

impl PayloadList {
    pub fn new() -> Self {
        Self {
            list: ScrollableList::new(),
            filter_input: FilterInput::new("name or description…"),
            query: String::new(),
            last_click: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_input.is_active()
    }

    /// The filter bar takes the last inner row while open or holding a query.
    fn shows_filter_bar(&self) -> bool {
        self.is_filter_active() || !self.query.is_empty()
    }

    /// Item row under screen row `row`, or `None` on the border or filter bar.
    fn row_at(&self, row: u16, area: Rect, rows_per_item: usize) -> Option<usize> {
        let top = area.y + 1;
        let mut bottom = (area.y + area.height).saturating_sub(1);
        if self.shows_filter_bar() {
            bottom = bottom.saturating_sub(1);
        }
        (row >= top && row < bottom).then(|| (row - top) as usize / rows_per_item)
    }

    /// Name under the cursor.
    pub fn cursor_name(&self) -> Option<&str> {
        self.list.selected_key().map(String::as_str)
    }

    fn views<'a>(&self, state: &'a AppState) -> Vec<PayloadView<'a>> {
        project(
            &state.catalog,
            &self.query,
            &state.core.state,
            state.core.selected.as_deref(),
        )
    }

    /// Re-project and hand the visible names to the cursor.
    pub fn refresh(&mut self, state: &AppState) {
        let names = self
            .views(state)
            .iter()
            .map(|v| v.payload.name.clone())
            .collect();
        self.list.set_keys(names);
    }

    fn set_query(&mut self, query: &str, state: &AppState) {
        self.query = query.to_string();
        self.list.scroll_offset = 0;
        self.refresh(state);
    }

    fn send_cursor(&self) -> Vec<Action> {
        self.cursor_name()
            .map(|n| vec![Action::Send(n.to_string())])
            .unwrap_or_default()
    }

    fn favorite_cursor(&self) -> Vec<Action> {
        self.cursor_name()
            .map(|n| vec![Action::ToggleFavorite(n.to_string())])
            .unwrap_or_default()
    }

    fn render_item<'a>(
        view: &PayloadView<'a>,
        is_cursor: bool,
        state: &AppState,
    ) -> ListItem<'a> {
        let dispatch = &state.core.dispatch;
        let (icon, icon_color) = if view.is_selected {
            let tracked = dispatch.active.as_deref() == Some(view.payload.name.as_str());
            match dispatch.phase {
                DispatchPhase::Sending if tracked => ("⋯", C_SENDING),
                DispatchPhase::Sent if tracked => ("▶", C_SENT),
                DispatchPhase::Failed if tracked => ("✗", C_ACCENT),
                _ => ("▶", C_PRIMARY),
            }
        } else {
            (" ", C_MUTED)
        };

        let name_style = if is_cursor || view.is_selected {
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_SECONDARY)
        };

        let mut spans = vec![
            Span::styled(
                if view.is_favorite { "★ " } else { "  " },
                Style::default().fg(C_FAVORITE),
            ),
            Span::styled(icon, Style::default().fg(icon_color)),
            Span::raw(" "),
            Span::styled(view.payload.name.clone(), name_style),
            Span::styled(
                format!("  {} KB", format_size(view.payload.size_kb)),
                Style::default().fg(C_SIZE),
            ),
        ];
        if view.is_recent {
            spans.push(Span::styled("  recent", Style::default().fg(C_RECENT)));
        }
        if state.layout == ListLayout::Compact && is_cursor {
            spans.push(Span::styled(
                format!("  {}", view.payload.description),
                Style::default().fg(C_MUTED),
            ));
        }

        let mut lines = vec![Line::from(spans)];
        if state.layout == ListLayout::Detailed {
            let mut detail = vec![
                Span::raw("     "),
                Span::styled(view.payload.description.clone(), Style::default().fg(C_SECONDARY)),
            ];
            if let Some(image) = &view.image {
                detail.push(Span::styled(format!("  [{}]", image), Style::default().fg(C_MUTED)));
            }
            lines.push(Line::from(detail));
        }

        let bg = if is_cursor {
            Style::default().bg(C_SELECTION_BG)
        } else {
            Style::default()
        };
        ListItem::new(lines).style(bg)
    }
}

impl Default for PayloadList {
    fn default() -> Self {
        Self::new()
    }
}

/// Sizes print without a trailing `.0` (`143`, `4.5`).
pub fn format_size(size_kb: f64) -> String {
    if size_kb.fract() == 0.0 {
        format!("{:.0}", size_kb)
    } else {
        format!("{}", size_kb)
    }
}

impl Component for PayloadList {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        self.refresh(state);

        if self.is_filter_active() {
            match key.code {
                KeyCode::Up => {
                    self.list.select_up(1);
                    return vec![];
                }
                KeyCode::Down => {
                    self.list.select_down(1);
                    return vec![];
                }
                _ => {}
            }
            return match self.filter_input.handle_key(key) {
                FilterAction::Changed(q) => {
                    self.set_query(&q, state);
                    vec![Action::FilterChanged(q)]
                }
                FilterAction::Confirmed => vec![Action::CloseFilter],
                FilterAction::Cancelled => {
                    self.set_query("", state);
                    vec![Action::CloseFilter]
                }
            };
        }

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_down(step),
            KeyCode::PageUp => self.list.select_up(10),
            KeyCode::PageDown => self.list.select_down(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.list.select_last(),

            KeyCode::Enter => return self.send_cursor(),
            KeyCode::Char('*') | KeyCode::Char('f') => return self.favorite_cursor(),
            KeyCode::Char('v') => return vec![Action::ToggleLayout],

            KeyCode::Char('/') => {
                self.filter_input.activate();
                return vec![Action::OpenFilter];
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &AppState) -> Vec<Action> {
        self.refresh(state);
        match event.kind {
            MouseEventKind::ScrollUp => self.list.select_up(1),
            MouseEventKind::ScrollDown => self.list.select_down(1),
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(rel_row) = self.row_at(event.row, area, state.layout.rows_per_item())
                else {
                    self.last_click = None;
                    return vec![];
                };
                let now = Instant::now();
                let is_double = self
                    .last_click
                    .map(|(row, t)| row == rel_row && t.elapsed().as_millis() < DOUBLE_CLICK_MS)
                    .unwrap_or(false);

                if self.list.handle_click(rel_row) && is_double {
                    self.last_click = None;
                    return self.favorite_cursor();
                }
                self.last_click = Some((rel_row, now));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        match action {
            Action::ClearFilter => {
                self.filter_input.clear();
                self.filter_input.deactivate();
                self.set_query("", state);
            }
            _ => self.refresh(state),
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let (badge_text, badge_color) = match state.core.dispatch.phase {
            DispatchPhase::Idle => ("", C_MUTED),
            DispatchPhase::Sending => ("SENDING", C_SENDING),
            DispatchPhase::Sent => ("SENT", C_SENT),
            DispatchPhase::Failed => ("FAILED", C_ACCENT),
        };
        let badge = (!badge_text.is_empty()).then_some(Badge {
            text: badge_text,
            color: badge_color,
        });
        let block = pane_chrome("payloads", Some('1'), focused, badge);
        let mut inner = block.inner(area);
        frame.render_widget(block, area);

        if self.shows_filter_bar() {
            let filter_area = Rect {
                y: inner.y + inner.height.saturating_sub(1),
                height: inner.height.min(1),
                ..inner
            };
            self.filter_input.draw(frame, filter_area);
            inner.height = inner.height.saturating_sub(1);
        }

        self.refresh(state);
        if self.list.is_empty() {
            let msg = if self.query.is_empty() {
                "  catalog is empty"
            } else {
                "  no payloads match filter"
            };
            frame.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(C_MUTED))),
                inner,
            );
            return;
        }

        let rows = (inner.height as usize / state.layout.rows_per_item()).max(1);
        self.list.ensure_visible(rows);
        let views = self.views(state);
        let range = self.list.visible_range(rows);
        let cursor = self.list.selected;
        let items: Vec<ListItem> = views[range.clone()]
            .iter()
            .zip(range)
            .map(|(view, idx)| Self::render_item(view, idx == cursor, state))
            .collect();

        frame.render_widget(List::new(items), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payload_proto::Catalog;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            Arc::new(Catalog::builtin()),
            "http://127.0.0.1:9090".to_string(),
            "payloads/".to_string(),
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_query(list: &mut PayloadList, state: &AppState, q: &str) {
        list.handle_key(key(KeyCode::Char('/')), state);
        for c in q.chars() {
            list.handle_key(key(KeyCode::Char(c)), state);
        }
    }

    #[test]
    fn enter_sends_cursor_payload() {
        let s = state();
        let mut list = PayloadList::new();
        list.handle_key(key(KeyCode::Down), &s);
        let second = s.catalog.list_all()[1].name.clone();
        assert_eq!(list.handle_key(key(KeyCode::Enter), &s), vec![Action::Send(second)]);
    }

    #[test]
    fn filter_narrows_then_enter_sends_match() {
        let s = state();
        let mut list = PayloadList::new();
        type_query(&mut list, &s, "usb storage");
        assert_eq!(list.query(), "usb storage");
        assert_eq!(list.handle_key(key(KeyCode::Enter), &s), vec![Action::CloseFilter]);
        assert_eq!(
            list.handle_key(key(KeyCode::Enter), &s),
            vec![Action::Send("app2usb.bin".to_string())]
        );
    }

    #[test]
    fn star_and_f_toggle_favorite() {
        let s = state();
        let mut list = PayloadList::new();
        let first = s.catalog.list_all()[0].name.clone();
        assert_eq!(
            list.handle_key(key(KeyCode::Char('*')), &s),
            vec![Action::ToggleFavorite(first.clone())]
        );
        assert_eq!(
            list.handle_key(key(KeyCode::Char('f')), &s),
            vec![Action::ToggleFavorite(first)]
        );
    }

    #[test]
    fn no_match_yields_no_action() {
        let s = state();
        let mut list = PayloadList::new();
        type_query(&mut list, &s, "zzzz");
        list.handle_key(key(KeyCode::Enter), &s);
        assert!(list.handle_key(key(KeyCode::Enter), &s).is_empty());
    }

    #[test]
    fn clear_filter_restores_full_list() {
        let s = state();
        let mut list = PayloadList::new();
        type_query(&mut list, &s, "ftp");
        list.on_action(&Action::ClearFilter, &s);
        assert!(!list.is_filter_active());
        assert_eq!(list.query(), "");
        list.handle_key(key(KeyCode::End), &s);
        let last = s.catalog.list_all().last().map(|p| p.name.clone());
        assert_eq!(list.cursor_name().map(str::to_string), last);
    }

    fn click(row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 5,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn double_click_on_row_toggles_favorite() {
        let s = state();
        let mut list = PayloadList::new();
        let area = Rect::new(0, 2, 40, 10);
        let second = s.catalog.list_all()[1].name.clone();
        assert!(list.handle_mouse(click(4), area, &s).is_empty());
        assert_eq!(
            list.handle_mouse(click(4), area, &s),
            vec![Action::ToggleFavorite(second)]
        );
    }

    #[test]
    fn clicks_on_border_or_filter_bar_are_ignored() {
        let s = state();
        let mut list = PayloadList::new();
        let area = Rect::new(0, 2, 40, 10);

        // top border, twice
        assert!(list.handle_mouse(click(2), area, &s).is_empty());
        assert!(list.handle_mouse(click(2), area, &s).is_empty());
        // bottom border
        assert!(list.handle_mouse(click(11), area, &s).is_empty());
        assert!(list.handle_mouse(click(11), area, &s).is_empty());
        assert_eq!(list.cursor_name(), Some(s.catalog.list_all()[0].name.as_str()));

        // with the filter open, the last inner row is the search bar
        type_query(&mut list, &s, "ftp");
        assert!(list.handle_mouse(click(10), area, &s).is_empty());
        assert!(list.handle_mouse(click(10), area, &s).is_empty());
        assert_eq!(list.query(), "ftp");
    }

    #[test]
    fn sizes_drop_trailing_zero() {
        assert_eq!(format_size(143.0), "143");
        assert_eq!(format_size(4.5), "4.5");
    }
}
