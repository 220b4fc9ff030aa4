use crate::grid::Grid;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Bounded undo/redo stacks of whole-grid snapshots.
///
/// Both stacks drop their oldest entry once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Grid>,
    redo_stack: VecDeque<Grid>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        History::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            undo_stack: VecDeque::with_capacity(capacity),
            redo_stack: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push_bounded(stack: &mut VecDeque<Grid>, grid: Grid, capacity: usize) {
        if capacity == 0 {
            return;
        }
        stack.push_back(grid);
        while stack.len() > capacity {
            stack.pop_front();
        }
    }

    /// Record the grid as it was before a mutation. Invalidates redo.
    pub fn record(&mut self, before: Grid) {
        Self::push_bounded(&mut self.undo_stack, before, self.capacity);
        self.redo_stack.clear();
    }

    /// Swap `current` with the most recent snapshot. Returns false when
    /// there is nothing to undo.
    pub fn undo(&mut self, current: &mut Grid) -> bool {
        let Some(previous) = self.undo_stack.pop_back() else {
            return false;
        };
        let live = std::mem::replace(current, previous);
        Self::push_bounded(&mut self.redo_stack, live, self.capacity);
        true
    }

    pub fn redo(&mut self, current: &mut Grid) -> bool {
        let Some(next) = self.redo_stack.pop_back() else {
            return false;
        };
        let live = std::mem::replace(current, next);
        Self::push_bounded(&mut self.undo_stack, live, self.capacity);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
