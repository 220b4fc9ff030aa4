use crate::cell::{CellAddress, CellValue, Range, cell_id, column_label};
use crate::error::GridError;
use crate::reference::EvalContext;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROWS: usize = 20;
pub const DEFAULT_COLS: usize = 10;

/// Fixed-size 2-D store of raw cell values for one sheet.
///
/// Every row holds exactly `cols` cells; the grid never grows on write.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<Vec<CellValue>>,
    /// Column headers, `A`, `B`, ... unless loaded otherwise.
    pub columns: Vec<String>,
}

impl Default for Grid {
    fn default() -> Self {
        Grid::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![vec![CellValue::Empty; cols]; rows],
            columns: (0..cols).map(column_label).collect(),
        }
    }

    /// Build a grid from possibly ragged rows, padding short rows with empty cells.
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let cells: Vec<Vec<CellValue>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(cols, CellValue::Empty);
                row
            })
            .collect();
        Grid {
            rows: cells.len(),
            cols,
            cells,
            columns: (0..cols).map(column_label).collect(),
        }
    }

    fn check(&self, row: usize, col: usize) -> Result<(), GridError> {
        if row >= self.rows || col >= self.cols {
            return Err(GridError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    pub fn in_bounds(&self, cell: CellAddress) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Result<&CellValue, GridError> {
        self.check(row, col)?;
        Ok(&self.cells[row][col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: CellValue) -> Result<(), GridError> {
        self.check(row, col)?;
        self.cells[row][col] = value;
        Ok(())
    }

    pub fn get_at(&self, cell: CellAddress) -> Result<&CellValue, GridError> {
        self.get(cell.row, cell.col)
    }

    /// Raw editor text of a cell; empty for out-of-bounds positions.
    pub fn raw_text(&self, cell: CellAddress) -> String {
        self.get_at(cell).map(CellValue::raw_text).unwrap_or_default()
    }

    pub fn column_label(&self, index: usize) -> String {
        self.columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| column_label(index))
    }

    pub fn cell_id(&self, row: usize, col: usize) -> String {
        cell_id(row, col)
    }

    /// The whole sheet as a range, `None` when the grid has no cells.
    pub fn bounds(&self) -> Option<Range> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        Some(Range::new(
            CellAddress::new(0, 0),
            CellAddress::new(self.rows - 1, self.cols - 1),
        ))
    }

    /// Clamp a range to the grid, `None` if they do not overlap.
    pub fn clamp(&self, range: Range) -> Option<Range> {
        if range.min_row >= self.rows || range.min_col >= self.cols {
            return None;
        }
        Some(Range {
            min_row: range.min_row,
            max_row: range.max_row.min(self.rows - 1),
            min_col: range.min_col,
            max_col: range.max_col.min(self.cols - 1),
        })
    }

    /// Copy of the raw values covered by `range` (clamped to the grid).
    pub fn slice(&self, range: Range) -> Vec<Vec<CellValue>> {
        let Some(range) = self.clamp(range) else {
            return Vec::new();
        };
        self.cells[range.min_row..=range.max_row]
            .iter()
            .map(|row| row[range.min_col..=range.max_col].to_vec())
            .collect()
    }

    pub fn clear_range(&mut self, range: Range) {
        let Some(range) = self.clamp(range) else {
            return;
        };
        for row in &mut self.cells[range.min_row..=range.max_row] {
            row[range.min_col..=range.max_col].fill(CellValue::Empty);
        }
    }

    /// Write `block` with its top-left at `origin`, dropping whatever falls
    /// outside the grid. Returns the rectangle actually written.
    pub fn write_block(&mut self, origin: CellAddress, block: &[Vec<CellValue>]) -> Option<Range> {
        let height = block.len();
        let width = block.iter().map(Vec::len).max().unwrap_or(0);
        if height == 0 || width == 0 || !self.in_bounds(origin) {
            return None;
        }
        let end = CellAddress::new(origin.row + height - 1, origin.col + width - 1);
        let written = self.clamp(Range::new(origin, end))?;
        for (dr, values) in block.iter().enumerate().take(written.height()) {
            for (dc, value) in values.iter().enumerate().take(written.width()) {
                self.cells[origin.row + dr][origin.col + dc] = value.clone();
            }
        }
        Some(written)
    }

    /// Iterate `(address, value)` over non-empty cells, row-major.
    pub fn occupied(&self) -> impl Iterator<Item = (CellAddress, &CellValue)> {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, v)| !v.is_empty())
                .map(move |(c, v)| (CellAddress::new(r, c), v))
        })
    }

    /// Addresses of cells holding formulas.
    pub fn formula_cells(&self) -> Vec<CellAddress> {
        self.occupied()
            .filter(|(_, v)| v.is_formula())
            .map(|(cell, _)| cell)
            .collect()
    }

    /// Context of the literal (non-formula) cells only.
    pub fn literal_context(&self) -> EvalContext {
        self.occupied()
            .filter(|(_, v)| !v.is_formula())
            .map(|(cell, v)| (cell.id(), v.clone()))
            .collect()
    }

    pub fn raw_rows(&self) -> &[Vec<CellValue>] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: &str) -> CellAddress {
        CellAddress::parse(id).unwrap()
    }

    #[test]
    fn test_default_size_and_headers() {
        let grid = Grid::default();
        assert_eq!((grid.rows, grid.cols), (20, 10));
        assert_eq!(grid.columns.first().map(String::as_str), Some("A"));
        assert_eq!(grid.column_label(9), "J");
        assert_eq!(grid.cell_id(4, 1), "B5");
    }

    #[test]
    fn test_get_set_bounds() {
        let mut grid = Grid::new(2, 2);
        grid.set(1, 1, CellValue::Number(5.0)).unwrap();
        assert_eq!(grid.get(1, 1), Ok(&CellValue::Number(5.0)));
        assert_eq!(
            grid.set(2, 0, CellValue::Empty),
            Err(GridError::OutOfBounds { row: 2, col: 0, rows: 2, cols: 2 })
        );
        assert!(grid.get(0, 2).is_err());
    }

    #[test]
    fn test_from_rows_pads() {
        let grid = Grid::from_rows(vec![
            vec![CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::Empty, CellValue::Text("x".into())],
        ]);
        assert_eq!((grid.rows, grid.cols), (2, 3));
        assert_eq!(grid.get(0, 2), Ok(&CellValue::Empty));
        assert!(grid.raw_rows().iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_write_block_truncates() {
        let mut grid = Grid::new(3, 3);
        let block = vec![vec![CellValue::Number(1.0); 2]; 2];
        let written = grid.write_block(addr("B2"), &block).unwrap();
        assert_eq!(written, Range::parse("B2:C3").unwrap());
        let written = grid.write_block(addr("C3"), &block).unwrap();
        assert_eq!(written, Range::single(addr("C3")));
        assert_eq!(grid.write_block(addr("D1"), &block), None);
    }

    #[test]
    fn test_slice_and_clear() {
        let mut grid = Grid::new(3, 3);
        grid.set(0, 0, CellValue::Number(1.0)).unwrap();
        grid.set(1, 1, CellValue::Formula("=A1".into())).unwrap();
        let range = Range::parse("A1:B2").unwrap();
        assert_eq!(grid.slice(range)[1][1], CellValue::Formula("=A1".into()));
        assert_eq!(grid.formula_cells(), vec![addr("B2")]);
        assert_eq!(grid.literal_context().len(), 1);
        grid.clear_range(range);
        assert_eq!(grid.occupied().count(), 0);
    }
}
