//! Action enum: all user-initiated intents and internal events.

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Payloads ─────────────────────────────────────────────────────────────
    /// Mark the payload selected and inject it.
    Send(String),
    ToggleFavorite(String),

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,
    FilterChanged(String),
    ClearFilter,

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleLayout,
    ToggleHelp,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
    Resize(u16, u16),
}

/// Row layout of the payload list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListLayout {
    /// One line per payload: badges, name, size.
    #[default]
    Compact,
    /// Adds the description and image path under each name.
    Detailed,
}

impl ListLayout {
    pub fn toggle(self) -> Self {
        match self {
            Self::Compact => Self::Detailed,
            Self::Detailed => Self::Compact,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Detailed => "detailed",
        }
    }

    pub fn rows_per_item(self) -> usize {
        match self {
            Self::Compact => 1,
            Self::Detailed => 2,
        }
    }
}
