//! Toast notification: one transient status message at a time.
//!
//! A new notice replaces whatever is showing and restarts the timer.

use std::time::{Duration, Instant};

use payload_proto::{Notice, NoticeLevel};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS, C_TOAST_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl From<NoticeLevel> for Severity {
    fn from(level: NoticeLevel) -> Self {
        match level {
            NoticeLevel::Info => Self::Info,
            NoticeLevel::Success => Self::Success,
            NoticeLevel::Warning => Self::Warning,
            NoticeLevel::Error => Self::Error,
        }
    }
}

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

pub struct ToastManager {
    current: Option<Toast>,
    duration: Duration,
}

impl ToastManager {
    pub fn new(duration: Duration) -> Self {
        Self {
            current: None,
            duration,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) {
        self.current = Some(Toast {
            message: message.into(),
            severity,
            expires: Instant::now() + self.duration,
        });
    }

    pub fn notice(&mut self, notice: Notice) {
        self.push(notice.message, notice.level.into());
    }

    /// Drop the toast once its time is up. Returns true if one was removed.
    pub fn tick(&mut self) -> bool {
        self.expire_at(Instant::now())
    }

    fn expire_at(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(t) if t.expires <= now => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn message(&self) -> Option<(&str, Severity)> {
        self.current
            .as_ref()
            .map(|t| (t.message.as_str(), t.severity))
    }

    /// Render the toast in the top-right corner of `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let Some(toast) = &self.current else {
            return;
        };
        let max_width = (area.width / 2).clamp(30, 60).min(area.width);

        let color = match toast.severity {
            Severity::Info => C_TOAST_INFO,
            Severity::Success => C_TOAST_SUCCESS,
            Severity::Warning => C_TOAST_WARNING,
            Severity::Error => C_TOAST_ERROR,
        };
        let icon = match toast.severity {
            Severity::Info => "·",
            Severity::Success => "✓",
            Severity::Warning => "!",
            Severity::Error => "✗",
        };

        let msg_len = toast.message.width() as u16;
        let w = (msg_len + 4).min(max_width);
        let x = area.x + area.width.saturating_sub(w + 1);
        let toast_area = Rect {
            x,
            y: area.y + 1,
            width: w,
            height: 1,
        };
        frame.render_widget(Clear, toast_area);
        let paragraph = Paragraph::new(Line::from(vec![Span::styled(
            format!(" {} {} ", icon, &toast.message),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )]));
        frame.render_widget(paragraph, toast_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_notice_replaces_older() {
        let mut toasts = ToastManager::new(Duration::from_secs(3));
        toasts.notice(Notice::new("Injecting a.bin...", NoticeLevel::Info));
        toasts.notice(Notice::new("a.bin sent successfully!", NoticeLevel::Success));
        assert_eq!(
            toasts.message(),
            Some(("a.bin sent successfully!", Severity::Success))
        );
    }

    #[test]
    fn expires_after_duration() {
        let mut toasts = ToastManager::new(Duration::from_secs(3));
        toasts.push("hello", Severity::Info);
        assert!(!toasts.expire_at(Instant::now()));
        assert!(toasts.expire_at(Instant::now() + Duration::from_secs(4)));
        assert!(toasts.is_empty());
    }

    #[test]
    fn replacing_restarts_timer() {
        let mut toasts = ToastManager::new(Duration::from_millis(50));
        toasts.push("first", Severity::Info);
        let later = Instant::now() + Duration::from_millis(40);
        toasts.push("second", Severity::Error);
        assert!(!toasts.expire_at(later));
        assert_eq!(toasts.message().map(|(m, _)| m), Some("second"));
    }
}
