//! Header: one row with the app name, receiver endpoint and the tracked
//! dispatch. Not focusable.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    app_state::AppState,
    theme::{C_ACCENT, C_MUTED, C_PRIMARY, C_SECONDARY},
    widgets::status_bar::dispatch_badge,
};

pub fn draw(frame: &mut Frame, area: Rect, state: &AppState) {
    let (phase, color) = dispatch_badge(&state.core.dispatch);
    let mut spans = vec![
        Span::styled(
            " payloader ",
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("→ ", Style::default().fg(C_MUTED)),
        Span::styled(state.receiver_url.clone(), Style::default().fg(C_SECONDARY)),
        Span::raw("   "),
    ];

    if let Some(active) = &state.core.dispatch.active {
        spans.push(Span::styled(
            active.clone(),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!(" {}", phase), Style::default().fg(color)));
    }

    let favs = state.core.state.favorites.len();
    spans.push(Span::styled(
        format!("   ★ {}  recent {}", favs, state.core.state.recents.len()),
        Style::default().fg(C_MUTED),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
