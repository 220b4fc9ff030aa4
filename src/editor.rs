//! Grid editing session: keyboard and mouse input, the shared draft buffer,
//! clipboard, undo/redo and autosave scheduling for one open sheet.

use crate::autosave::{AutoSaveConfig, AutoSaver};
use crate::cell::{CellAddress, CellValue, Range};
use crate::clipboard::Clipboard;
use crate::config::EditorConfig;
use crate::error::StoreError;
use crate::grid::Grid;
use crate::history::History;
use crate::recalc::{SheetResolver, affected_cells};
use crate::saving::{SheetStore, load_or_default};
use crate::selection::{Direction, EnterPolicy, Key, KeyInput, Selection};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Outcome of one input, telling the UI what to redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    Ignored,
    /// Active cell or range changed.
    Moved(CellAddress),
    EditStarted(CellAddress),
    DraftChanged,
    EditCancelled(CellAddress),
    /// Edit mode ended without changing the stored value.
    EditClosed(CellAddress),
    /// The grid changed; these cells need re-rendering.
    GridChanged(BTreeSet<CellAddress>),
}

pub struct Editor {
    sheet_id: String,
    grid: Grid,
    selection: Selection,
    history: History,
    clipboard: Clipboard,
    config: EditorConfig,
    autosave: Option<AutoSaver>,
}

impl Editor {
    /// Editor without background saving.
    pub fn new(sheet_id: impl Into<String>, grid: Grid, config: EditorConfig) -> Self {
        Editor {
            sheet_id: sheet_id.into(),
            grid,
            selection: Selection::new(),
            history: History::new(config.history_capacity),
            clipboard: Clipboard::new(),
            config,
            autosave: None,
        }
    }

    /// Load `sheet_id` from `store` (or start a default-sized grid) and save
    /// edits back through a debounced [`AutoSaver`]. Needs a tokio runtime.
    pub fn open(sheet_id: &str, store: Arc<dyn SheetStore>, config: EditorConfig) -> Result<Self, StoreError> {
        let grid = load_or_default(store.as_ref(), sheet_id, config.default_rows, config.default_cols)?;
        let saver = AutoSaver::spawn(
            store,
            sheet_id,
            AutoSaveConfig {
                quiet_window: config.quiet_window(),
            },
        );
        let mut editor = Editor::new(sheet_id, grid, config);
        editor.autosave = Some(saver);
        Ok(editor)
    }

    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn autosaver(&self) -> Option<&AutoSaver> {
        self.autosave.as_ref()
    }

    pub fn handle_key(&mut self, input: KeyInput) -> EditEvent {
        if self.selection.is_editing() {
            self.handle_editing_key(input)
        } else {
            self.handle_idle_key(input)
        }
    }

    fn handle_idle_key(&mut self, input: KeyInput) -> EditEvent {
        let (rows, cols) = (self.grid.rows, self.grid.cols);
        match input.key {
            Key::Arrow(direction) if input.shift => {
                self.selection.extend(direction, rows, cols);
                EditEvent::Moved(self.selection.active())
            }
            Key::Arrow(direction) => {
                self.selection.move_by(direction, rows, cols);
                EditEvent::Moved(self.selection.active())
            }
            Key::Enter => self.begin_edit(),
            Key::Tab => {
                let direction = if input.shift { Direction::Left } else { Direction::Right };
                self.selection.move_by(direction, rows, cols);
                EditEvent::Moved(self.selection.active())
            }
            Key::Escape => {
                if self.selection.clear_range() {
                    EditEvent::Moved(self.selection.active())
                } else {
                    EditEvent::Ignored
                }
            }
            Key::Delete | Key::Backspace => self.clear_selection(),
            Key::Char(c) => {
                if !self.grid.in_bounds(self.selection.active()) {
                    return EditEvent::Ignored;
                }
                self.selection.clear_range();
                self.selection.begin_edit(c.to_string());
                EditEvent::EditStarted(self.selection.active())
            }
        }
    }

    fn handle_editing_key(&mut self, input: KeyInput) -> EditEvent {
        match input.key {
            // the text input owns the cursor while editing
            Key::Arrow(_) | Key::Delete => EditEvent::Ignored,
            Key::Enter => {
                let event = self.commit();
                if self.config.enter_policy == EnterPolicy::CommitAndMove {
                    self.selection.move_by(Direction::Down, self.grid.rows, self.grid.cols);
                }
                event
            }
            Key::Tab => {
                let event = self.commit();
                let direction = if input.shift { Direction::Left } else { Direction::Right };
                self.selection.move_by(direction, self.grid.rows, self.grid.cols);
                event
            }
            Key::Escape => self.cancel(),
            Key::Backspace => {
                self.selection.pop_char();
                EditEvent::DraftChanged
            }
            Key::Char(c) => {
                self.selection.push_char(c);
                EditEvent::DraftChanged
            }
        }
    }

    /// Make `cell` active. An edit in progress is committed first.
    pub fn click(&mut self, cell: CellAddress) -> EditEvent {
        if !self.grid.in_bounds(cell) {
            return EditEvent::Ignored;
        }
        let committed = self.commit();
        self.selection.select_cell(cell);
        match committed {
            EditEvent::GridChanged(_) => committed,
            _ => EditEvent::Moved(cell),
        }
    }

    pub fn shift_click(&mut self, cell: CellAddress) -> EditEvent {
        if !self.grid.in_bounds(cell) {
            return EditEvent::Ignored;
        }
        let committed = self.commit();
        self.selection.extend_to(cell);
        match committed {
            EditEvent::GridChanged(_) => committed,
            _ => EditEvent::Moved(cell),
        }
    }

    pub fn double_click(&mut self, cell: CellAddress) -> EditEvent {
        match self.click(cell) {
            EditEvent::Ignored => EditEvent::Ignored,
            _ => self.begin_edit(),
        }
    }

    /// Start editing the active cell, seeded with its raw stored text.
    pub fn begin_edit(&mut self) -> EditEvent {
        let active = self.selection.active();
        if self.selection.is_editing() || !self.grid.in_bounds(active) {
            return EditEvent::Ignored;
        }
        self.selection.clear_range();
        self.selection.begin_edit(self.grid.raw_text(active));
        EditEvent::EditStarted(active)
    }

    /// Formula bar input. Shares the draft with the in-cell editor.
    pub fn set_formula_bar_text(&mut self, text: &str) -> EditEvent {
        if !self.selection.is_editing() && self.begin_edit() == EditEvent::Ignored {
            return EditEvent::Ignored;
        }
        self.selection.set_draft(text);
        EditEvent::DraftChanged
    }

    /// What the formula bar shows: the draft while editing, otherwise the
    /// raw text of the active cell.
    pub fn formula_bar_text(&self) -> String {
        if self.selection.is_editing() {
            self.selection.draft().to_string()
        } else {
            self.grid.raw_text(self.selection.active())
        }
    }

    /// Write the draft into the grid and leave edit mode.
    pub fn commit(&mut self) -> EditEvent {
        let Some((cell, draft)) = self.selection.finish_edit() else {
            return EditEvent::Ignored;
        };
        let value = CellValue::from_input(&draft);
        match self.mutate(|grid| {
            grid.set(cell.row, cell.col, value).ok()?;
            Some(vec![cell])
        }) {
            EditEvent::Ignored => EditEvent::EditClosed(cell),
            event => {
                debug!("committed {} = {:?}", cell, draft);
                event
            }
        }
    }

    /// Drop the draft; the grid is untouched.
    pub fn cancel(&mut self) -> EditEvent {
        match self.selection.cancel_edit() {
            Some(cell) => EditEvent::EditCancelled(cell),
            None => EditEvent::Ignored,
        }
    }

    /// Empty the selected range (or the active cell) as one undoable edit.
    pub fn clear_selection(&mut self) -> EditEvent {
        let target = self.selection.target();
        self.mutate(|grid| {
            grid.clear_range(target);
            Some(target.cells().collect())
        })
    }

    /// Copy the selected range. Without a range nothing is copied.
    pub fn copy(&mut self) -> bool {
        match self.selection.range() {
            Some(range) => {
                self.clipboard.copy(&self.grid, range);
                true
            }
            None => false,
        }
    }

    pub fn cut(&mut self) -> EditEvent {
        let Some(range) = self.selection.range() else {
            return EditEvent::Ignored;
        };
        self.clipboard.copy(&self.grid, range);
        self.mutate(|grid| {
            grid.clear_range(range);
            Some(range.cells().collect())
        })
    }

    /// Paste at the active cell and select the pasted rectangle.
    pub fn paste(&mut self) -> EditEvent {
        if self.selection.is_editing() || self.clipboard.is_empty() {
            return EditEvent::Ignored;
        }
        let target = self.selection.active();
        let mut written: Option<Range> = None;
        let clipboard = &self.clipboard;
        let event = Self::mutate_grid(
            &mut self.grid,
            &mut self.history,
            self.autosave.as_ref(),
            |grid| {
                let range = clipboard.paste(grid, target)?;
                written = Some(range);
                Some(range.cells().collect())
            },
        );
        if let Some(range) = written {
            debug!("pasted into {}", range);
            self.selection.select_range(range);
        }
        event
    }

    /// Replace the whole grid (e.g. after a CSV import) as one undoable edit.
    pub fn replace_grid(&mut self, grid: Grid) -> EditEvent {
        self.selection.cancel_edit();
        let event = self.mutate(|live| {
            *live = grid;
            Some(live.bounds().map(|b| b.cells().collect()).unwrap_or_default())
        });
        if !self.grid.in_bounds(self.selection.active()) {
            self.selection.select_cell(CellAddress::new(0, 0));
        }
        event
    }

    pub fn undo(&mut self) -> EditEvent {
        self.selection.cancel_edit();
        let before = self.grid.clone();
        if !self.history.undo(&mut self.grid) {
            return EditEvent::Ignored;
        }
        debug!("undo in sheet {}", self.sheet_id);
        self.after_swap(&before)
    }

    pub fn redo(&mut self) -> EditEvent {
        self.selection.cancel_edit();
        let before = self.grid.clone();
        if !self.history.redo(&mut self.grid) {
            return EditEvent::Ignored;
        }
        debug!("redo in sheet {}", self.sheet_id);
        self.after_swap(&before)
    }

    fn after_swap(&mut self, before: &Grid) -> EditEvent {
        if !self.grid.in_bounds(self.selection.active()) {
            self.selection.select_cell(CellAddress::new(0, 0));
        }
        if let Some(saver) = &self.autosave {
            saver.schedule(self.grid.clone());
        }
        let changed = changed_cells(before, &self.grid);
        EditEvent::GridChanged(affected_cells(&self.grid, &changed))
    }

    fn mutate<F>(&mut self, f: F) -> EditEvent
    where
        F: FnOnce(&mut Grid) -> Option<Vec<CellAddress>>,
    {
        Self::mutate_grid(&mut self.grid, &mut self.history, self.autosave.as_ref(), f)
    }

    // Apply `f`; a mutation that leaves the grid as it was records nothing.
    fn mutate_grid<F>(grid: &mut Grid, history: &mut History, autosave: Option<&AutoSaver>, f: F) -> EditEvent
    where
        F: FnOnce(&mut Grid) -> Option<Vec<CellAddress>>,
    {
        let before = grid.clone();
        let Some(touched) = f(grid) else {
            return EditEvent::Ignored;
        };
        if *grid == before {
            return EditEvent::Ignored;
        }
        history.record(before);
        if let Some(saver) = autosave {
            saver.schedule(grid.clone());
        }
        EditEvent::GridChanged(affected_cells(grid, &touched))
    }

    /// Displayed value of a cell: formulas evaluated against the whole sheet.
    pub fn display_value(&self, cell: CellAddress) -> CellValue {
        SheetResolver::new(&self.grid).value_of(cell)
    }

    /// Displayed values of every cell.
    pub fn display_grid(&self) -> Vec<Vec<CellValue>> {
        SheetResolver::new(&self.grid).resolve_all()
    }

    /// Save any pending snapshot immediately.
    pub async fn flush(&self) -> Result<(), StoreError> {
        match &self.autosave {
            Some(saver) => saver.flush().await,
            None => Ok(()),
        }
    }

    /// Tear down the session. A pending autosave is cancelled, not written.
    pub fn close(mut self) {
        if let Some(mut saver) = self.autosave.take() {
            saver.cancel();
        }
        debug!("closed sheet {}", self.sheet_id);
    }
}

// Cells whose raw content differs; a resize marks every cell of the new grid.
fn changed_cells(before: &Grid, after: &Grid) -> Vec<CellAddress> {
    if before.rows != after.rows || before.cols != after.cols {
        return after.bounds().map(|b| b.cells().collect()).unwrap_or_default();
    }
    after
        .raw_rows()
        .iter()
        .zip(before.raw_rows())
        .enumerate()
        .flat_map(|(r, (new_row, old_row))| {
            new_row
                .iter()
                .zip(old_row)
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(move |(c, _)| CellAddress::new(r, c))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: &str) -> CellAddress {
        CellAddress::parse(id).unwrap()
    }

    fn editor() -> Editor {
        Editor::new("test", Grid::new(5, 5), EditorConfig::default())
    }

    fn type_text(editor: &mut Editor, text: &str) {
        for c in text.chars() {
            editor.handle_key(Key::Char(c).into());
        }
    }

    #[test]
    fn test_type_and_enter_commits_and_moves() {
        let mut ed = editor();
        type_text(&mut ed, "42");
        let event = ed.handle_key(Key::Enter.into());
        assert!(matches!(event, EditEvent::GridChanged(_)));
        assert_eq!(ed.grid().get(0, 0), Ok(&CellValue::Number(42.0)));
        assert_eq!(ed.selection().active(), addr("A2"));
        assert!(!ed.selection().is_editing());
    }

    #[test]
    fn test_commit_only_policy() {
        let config = EditorConfig {
            enter_policy: EnterPolicy::CommitOnly,
            ..EditorConfig::default()
        };
        let mut ed = Editor::new("test", Grid::new(5, 5), config);
        type_text(&mut ed, "x");
        ed.handle_key(Key::Enter.into());
        assert_eq!(ed.selection().active(), addr("A1"));
    }

    #[test]
    fn test_escape_discards_draft() {
        let mut ed = editor();
        type_text(&mut ed, "abc");
        assert_eq!(ed.formula_bar_text(), "abc");
        assert_eq!(ed.handle_key(Key::Escape.into()), EditEvent::EditCancelled(addr("A1")));
        assert_eq!(ed.grid().get(0, 0), Ok(&CellValue::Empty));
        assert!(!ed.history().can_undo());
    }

    #[test]
    fn test_enter_seeds_raw_formula() {
        let mut ed = editor();
        ed.set_formula_bar_text("=1+2");
        ed.commit();
        assert_eq!(ed.display_value(addr("A1")), CellValue::Number(3.0));
        ed.handle_key(Key::Enter.into());
        assert_eq!(ed.selection().draft(), "=1+2");
    }

    #[test]
    fn test_unchanged_commit_records_nothing() {
        let mut ed = editor();
        ed.handle_key(Key::Enter.into());
        assert_eq!(ed.commit(), EditEvent::EditClosed(addr("A1")));
        assert_eq!(ed.history().undo_len(), 0);
    }

    #[test]
    fn test_arrows_ignored_while_editing() {
        let mut ed = editor();
        type_text(&mut ed, "1");
        let event = ed.handle_key(KeyInput::new(Key::Arrow(Direction::Down)));
        assert_eq!(event, EditEvent::Ignored);
        assert_eq!(ed.selection().editing(), Some(addr("A1")));
    }

    #[test]
    fn test_click_commits_pending_edit() {
        let mut ed = editor();
        type_text(&mut ed, "7");
        assert!(matches!(ed.click(addr("C3")), EditEvent::GridChanged(_)));
        assert_eq!(ed.grid().get(0, 0), Ok(&CellValue::Number(7.0)));
        assert_eq!(ed.selection().active(), addr("C3"));
        assert_eq!(ed.click(addr("Z99")), EditEvent::Ignored);
    }

    #[test]
    fn test_commit_reports_dependents() {
        let mut ed = editor();
        ed.click(addr("A2"));
        ed.set_formula_bar_text("=A1*2");
        ed.click(addr("B1"));
        ed.set_formula_bar_text("=B1+1");
        ed.click(addr("A1"));
        ed.set_formula_bar_text("5");
        let EditEvent::GridChanged(affected) = ed.commit() else {
            panic!("commit should change the grid");
        };
        let expected: BTreeSet<CellAddress> = [addr("A1"), addr("A2"), addr("B1")].into_iter().collect();
        assert_eq!(affected, expected);
        assert_eq!(ed.display_value(addr("B1")), CellValue::Number(11.0));
    }

    #[test]
    fn test_delete_clears_range_as_one_edit() {
        let mut ed = editor();
        type_text(&mut ed, "1");
        ed.handle_key(Key::Tab.into());
        type_text(&mut ed, "2");
        ed.handle_key(Key::Tab.into());
        ed.click(addr("A1"));
        ed.shift_click(addr("B1"));
        ed.handle_key(Key::Delete.into());
        assert_eq!(ed.grid().occupied().count(), 0);
        ed.undo();
        assert_eq!(ed.grid().get(0, 1), Ok(&CellValue::Number(2.0)));
    }

    #[test]
    fn test_shift_arrow_builds_range() {
        let mut ed = editor();
        ed.handle_key(KeyInput::shifted(Key::Arrow(Direction::Right)));
        ed.handle_key(KeyInput::shifted(Key::Arrow(Direction::Down)));
        assert_eq!(ed.selection().range(), Range::parse("A1:B2"));
        ed.handle_key(Key::Escape.into());
        assert_eq!(ed.selection().range(), None);
    }

    #[test]
    fn test_close_without_autosave() {
        let ed = editor();
        assert!(ed.autosaver().is_none());
        ed.close();
    }
}
