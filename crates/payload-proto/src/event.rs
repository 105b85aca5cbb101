//! Events the core pushes out to whatever front end is listening.
//!
//! Notices model a single transient status line: each new notice replaces the
//! previous one, front ends dismiss it after a few seconds.

use tokio::sync::broadcast;

/// Message shown when a dispatch fails for any reason.
pub const GENERIC_FAILURE: &str = "Injection failed. Check network (9090 port) or payload file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn new(message: impl Into<String>, level: NoticeLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CoreEvent {
    Notice(Notice),
    /// Favorites, recents or dispatch status changed; re-read the snapshot.
    StateChanged,
}

/// Cloneable sender half for core events.
///
/// Sending never fails from the caller's point of view: with no subscriber
/// attached the event is simply dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<CoreEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn notice(&self, message: impl Into<String>, level: NoticeLevel) {
        let notice = Notice::new(message, level);
        tracing::debug!("notice: {}", notice.message);
        let _ = self.tx.send(CoreEvent::Notice(notice));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notice(message, NoticeLevel::Info);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notice(message, NoticeLevel::Success);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notice(message, NoticeLevel::Warning);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notice(message, NoticeLevel::Error);
    }

    pub fn state_changed(&self) {
        let _ = self.tx.send(CoreEvent::StateChanged);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}
