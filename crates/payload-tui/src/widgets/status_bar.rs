//! Status bar: bottom line with input mode, dispatch state and keybindings.

use payload_proto::{DispatchPhase, DispatchStatus};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{
    C_ACCENT, C_MODE_FILTER, C_MODE_NORMAL, C_MUTED, C_SENDING, C_SENT, C_SEPARATOR,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputMode {
    Normal,
    Filter,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Filter => "FILTER",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Normal => C_MODE_NORMAL,
            Self::Filter => C_MODE_FILTER,
        }
    }
}

/// Bulb and short label for the tracked dispatch.
pub fn dispatch_badge(status: &DispatchStatus) -> (&'static str, Color) {
    match status.phase {
        DispatchPhase::Idle => ("idle", C_MUTED),
        DispatchPhase::Sending => ("sending", C_SENDING),
        DispatchPhase::Sent => ("sent", C_SENT),
        DispatchPhase::Failed => ("failed", C_ACCENT),
    }
}

/// Draw a horizontal separator line.
pub fn draw_separator(frame: &mut Frame, area: Rect) {
    let line = Line::from(Span::styled(
        "─".repeat(area.width as usize),
        Style::default().fg(C_SEPARATOR),
    ));
    frame.render_widget(Paragraph::new(line), area);
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode, status: &DispatchStatus) {
    let (phase, bulb) = dispatch_badge(status);

    let mut spans = vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default().fg(mode.color()).add_modifier(Modifier::BOLD),
        ),
        Span::styled("●", Style::default().fg(bulb).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {} ", phase), Style::default().fg(bulb)),
    ];

    let keys = match mode {
        InputMode::Normal => {
            " ↑↓/jk select  Enter inject  */f favorite  v layout  / filter  ? help  q quit"
        }
        InputMode::Filter => " type to filter  Up/Down move  Enter keep  Esc clear+close",
    };
    spans.push(Span::styled(keys, Style::default().fg(C_MUTED)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
