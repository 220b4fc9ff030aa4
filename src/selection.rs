//! Active cell, range selection and the in-progress edit.

use crate::cell::{CellAddress, Range};
use serde::{Deserialize, Serialize};

/// What Enter does while a cell is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterPolicy {
    /// Commit and move the active cell one row down.
    #[default]
    CommitAndMove,
    CommitOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Arrow(Direction),
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        KeyInput { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        KeyInput { key, shift: true }
    }
}

impl From<Key> for KeyInput {
    fn from(key: Key) -> Self {
        KeyInput::new(key)
    }
}

/// Selection and editing state for one grid.
///
/// While a cell is being edited it is always the active cell; the
/// formula bar and the in-cell editor share `draft`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    active: CellAddress,
    anchor: Option<CellAddress>,
    range: Option<Range>,
    editing: Option<CellAddress>,
    draft: String,
}

fn step(cell: CellAddress, direction: Direction, rows: usize, cols: usize) -> CellAddress {
    let (row, col) = (cell.row, cell.col);
    match direction {
        Direction::Up => CellAddress::new(row.saturating_sub(1), col),
        Direction::Down => CellAddress::new((row + 1).min(rows.saturating_sub(1)), col),
        Direction::Left => CellAddress::new(row, col.saturating_sub(1)),
        Direction::Right => CellAddress::new(row, (col + 1).min(cols.saturating_sub(1))),
    }
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    pub fn active(&self) -> CellAddress {
        self.active
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    /// The selected range, or the active cell as a 1x1 range.
    pub fn target(&self) -> Range {
        self.range.unwrap_or_else(|| Range::single(self.active))
    }

    pub fn editing(&self) -> Option<CellAddress> {
        self.editing
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Move one step, clamped to `rows x cols`, dropping any range.
    pub fn move_by(&mut self, direction: Direction, rows: usize, cols: usize) {
        if self.is_editing() {
            return;
        }
        self.active = step(self.active, direction, rows, cols);
        self.anchor = None;
        self.range = None;
    }

    /// Shift-move: grow the range from the cell active when the shift
    /// sequence began.
    pub fn extend(&mut self, direction: Direction, rows: usize, cols: usize) {
        if self.is_editing() {
            return;
        }
        let next = step(self.active, direction, rows, cols);
        self.extend_to(next);
    }

    pub fn extend_to(&mut self, cell: CellAddress) {
        if self.is_editing() {
            return;
        }
        let anchor = *self.anchor.get_or_insert(self.active);
        self.active = cell;
        self.range = Some(Range::new(anchor, cell));
    }

    /// Make `cell` active with no range. Abandons any edit.
    pub fn select_cell(&mut self, cell: CellAddress) {
        self.cancel_edit();
        self.active = cell;
        self.anchor = None;
        self.range = None;
    }

    /// Select `range` with its top-left corner active.
    pub fn select_range(&mut self, range: Range) {
        self.cancel_edit();
        self.active = range.top_left();
        self.anchor = Some(range.top_left());
        self.range = Some(range);
    }

    pub fn clear_range(&mut self) -> bool {
        self.anchor = None;
        self.range.take().is_some()
    }

    pub fn begin_edit(&mut self, seed: String) {
        self.editing = Some(self.active);
        self.draft = seed;
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft.clear();
        self.draft.push_str(text);
    }

    pub fn push_char(&mut self, c: char) {
        self.draft.push(c);
    }

    pub fn pop_char(&mut self) {
        self.draft.pop();
    }

    /// Leave edit mode, handing back the edited cell and its draft.
    pub fn finish_edit(&mut self) -> Option<(CellAddress, String)> {
        let cell = self.editing.take()?;
        Some((cell, std::mem::take(&mut self.draft)))
    }

    pub fn cancel_edit(&mut self) -> Option<CellAddress> {
        self.draft.clear();
        self.editing.take()
    }
}
