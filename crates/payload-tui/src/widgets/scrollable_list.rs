//! Cursor and scroll window over a list of keys.
//!
//! The list does not own what it shows; callers hand it the keys of the
//! currently visible rows and it keeps the cursor on the same key across
//! refreshes where possible.

pub struct ScrollableList<K> {
    keys: Vec<K>,
    pub selected: usize,
    pub scroll_offset: usize,
}

impl<K: PartialEq> ScrollableList<K> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            selected: 0,
            scroll_offset: 0,
        }
    }

    /// Replace the visible keys. The cursor follows its previous key if it is
    /// still present, else clamps to the new length.
    pub fn set_keys(&mut self, keys: Vec<K>) {
        let prev = self.keys.get(self.selected);
        let pos = prev.and_then(|p| keys.iter().position(|k| k == p));
        self.keys = keys;
        match pos {
            Some(p) => self.selected = p,
            None => {
                if self.selected >= self.keys.len() {
                    self.selected = self.keys.len().saturating_sub(1);
                }
            }
        }
    }

    pub fn select_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn select_down(&mut self, n: usize) {
        if self.keys.is_empty() {
            return;
        }
        self.selected = (self.selected + n).min(self.keys.len() - 1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.keys.len().saturating_sub(1);
    }

    pub fn selected_key(&self) -> Option<&K> {
        self.keys.get(self.selected)
    }

    /// Adjust `scroll_offset` so the cursor is inside a window of `height` rows.
    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected.saturating_sub(height - 1);
        }
    }

    /// Range of key indices shown in a window of `height` rows.
    pub fn visible_range(&self, height: usize) -> std::ops::Range<usize> {
        let start = self.scroll_offset.min(self.keys.len());
        let end = (start + height).min(self.keys.len());
        start..end
    }

    /// Handle a click on window row `row`. Returns true if it hit an item.
    pub fn handle_click(&mut self, row: usize) -> bool {
        let target = self.scroll_offset + row;
        if target < self.keys.len() {
            self.selected = target;
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: PartialEq> Default for ScrollableList<K> {
    fn default() -> Self {
        Self::new()
    }
}
