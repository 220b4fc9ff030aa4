use crate::cell::{CellAddress, CellValue, Range};
use crate::grid::Grid;

/// Rectangular buffer of raw cell values captured by copy or cut.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    buffer: Option<Vec<Vec<CellValue>>>,
}

impl Clipboard {
    pub fn new() -> Self {
        Clipboard::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none()
    }

    pub fn contents(&self) -> Option<&[Vec<CellValue>]> {
        self.buffer.as_deref()
    }

    /// Capture `range` from `grid`. Formulas are copied as text, not values.
    pub fn copy(&mut self, grid: &Grid, range: Range) {
        let block = grid.slice(range);
        if !block.is_empty() {
            self.buffer = Some(block);
        }
    }

    /// Copy then clear the source range.
    pub fn cut(&mut self, grid: &mut Grid, range: Range) {
        self.copy(grid, range);
        grid.clear_range(range);
    }

    /// Write the buffer with its top-left at `target`. Returns the written
    /// rectangle, or `None` when nothing was pasted.
    pub fn paste(&self, grid: &mut Grid, target: CellAddress) -> Option<Range> {
        let block = self.buffer.as_ref()?;
        grid.write_block(target, block)
    }

    pub fn clear(&mut self) {
        self.buffer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: &str) -> CellAddress {
        CellAddress::parse(id).unwrap()
    }

    fn sample() -> Grid {
        let mut grid = Grid::new(4, 4);
        grid.set(0, 0, CellValue::Number(1.0)).unwrap();
        grid.set(0, 1, CellValue::Text("a".into())).unwrap();
        grid.set(1, 0, CellValue::Formula("=A1*2".into())).unwrap();
        grid
    }

    #[test]
    fn test_copy_paste_reproduces_region() {
        let mut grid = sample();
        let mut clipboard = Clipboard::new();
        clipboard.copy(&grid, Range::parse("A1:B2").unwrap());

        let written = clipboard.paste(&mut grid, addr("C3")).unwrap();
        assert_eq!(written, Range::parse("C3:D4").unwrap());
        assert_eq!(grid.get(2, 2), Ok(&CellValue::Number(1.0)));
        assert_eq!(grid.get(2, 3), Ok(&CellValue::Text("a".into())));
        assert_eq!(grid.get(3, 2), Ok(&CellValue::Formula("=A1*2".into())));
        // source untouched
        assert_eq!(grid.get(0, 0), Ok(&CellValue::Number(1.0)));
    }

    #[test]
    fn test_cut_clears_source() {
        let mut grid = sample();
        let mut clipboard = Clipboard::new();
        clipboard.cut(&mut grid, Range::parse("A1:B1").unwrap());
        assert_eq!(grid.get(0, 0), Ok(&CellValue::Empty));
        assert_eq!(clipboard.contents().map(|b| b[0].len()), Some(2));
    }

    #[test]
    fn test_paste_empty_clipboard_is_noop() {
        let mut grid = sample();
        let before = grid.clone();
        assert_eq!(Clipboard::new().paste(&mut grid, addr("A1")), None);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_paste_truncates_at_edge() {
        let mut grid = sample();
        let mut clipboard = Clipboard::new();
        clipboard.copy(&grid, Range::parse("A1:B2").unwrap());
        let written = clipboard.paste(&mut grid, addr("D4")).unwrap();
        assert_eq!(written, Range::single(addr("D4")));
        assert_eq!(grid.get(3, 3), Ok(&CellValue::Number(1.0)));
    }
}
