//! AppState: shared read-only data passed to all components during render/event.
//!
//! Components read this, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::sync::Arc;

use payload_proto::catalog::Catalog;
use payload_proto::ControllerSnapshot;

use crate::action::ListLayout;
use crate::widgets::status_bar::InputMode;

pub struct AppState {
    pub catalog: Arc<Catalog>,
    /// Latest core snapshot: favorites, recents, dispatch status, selection.
    pub core: ControllerSnapshot,
    pub receiver_url: String,
    pub source: String,
    pub input_mode: InputMode,
    pub layout: ListLayout,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, receiver_url: String, source: String) -> Self {
        Self {
            catalog,
            core: ControllerSnapshot::default(),
            receiver_url,
            source,
            input_mode: InputMode::Normal,
            layout: ListLayout::default(),
        }
    }
}
