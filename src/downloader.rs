use crate::cell::{CellValue, TEXT_PREFIX};
use crate::grid::Grid;
use std::path::Path;

/// Convert a grid to CSV
///
/// Every cell is written as its raw stored text (formulas are not
/// evaluated), wrapped in double quotes with embedded quotes doubled. Rows
/// are joined by `\n` with no trailing newline and no header row, so the
/// output reads back unchanged through [`crate::loader::from_csv`]. Text that
/// would otherwise read back as a number, boolean, formula or empty cell is
/// written with a leading [`TEXT_PREFIX`].
///
/// # Arguments
/// * `grid` - The grid to export
///
/// # Returns
/// * `String` - CSV content
///
/// # Examples
/// ```
/// use testsheet::cell::CellValue;
/// use testsheet::downloader::to_csv;
/// use testsheet::grid::Grid;
///
/// let mut grid = Grid::new(1, 2);
/// grid.set(0, 0, CellValue::Text("say \"hi\"".into())).unwrap();
/// grid.set(0, 1, CellValue::Formula("=A1".into())).unwrap();
/// assert_eq!(to_csv(&grid), "\"say \"\"hi\"\"\",\"=A1\"");
/// ```
pub fn to_csv(grid: &Grid) -> String {
    grid.raw_rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| quote_field(&field_text(value)))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write [`to_csv`] output to a file.
pub fn write_csv(grid: &Grid, path: impl AsRef<Path>) -> std::io::Result<()> {
    std::fs::write(path, to_csv(grid))
}

fn field_text(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) if s.starts_with(TEXT_PREFIX) || CellValue::from_input(s) != *value => {
            format!("{}{}", TEXT_PREFIX, s)
        }
        other => other.raw_text(),
    }
}

fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_numeric_cells() {
        let mut grid = Grid::new(2, 2);
        grid.set(0, 0, CellValue::Number(1.5)).unwrap();
        grid.set(1, 1, CellValue::Boolean(true)).unwrap();
        assert_eq!(to_csv(&grid), "\"1.5\",\"\"\n\"\",\"TRUE\"");
    }

    #[test]
    fn test_ambiguous_text_is_marked() {
        let mut grid = Grid::new(1, 4);
        grid.set(0, 0, CellValue::Text("007".into())).unwrap();
        grid.set(0, 1, CellValue::Text("=not a formula".into())).unwrap();
        grid.set(0, 2, CellValue::Text("'quoted".into())).unwrap();
        grid.set(0, 3, CellValue::Text("plain".into())).unwrap();
        assert_eq!(to_csv(&grid), "\"'007\",\"'=not a formula\",\"''quoted\",\"plain\"");
    }

    #[test]
    fn test_commas_and_newlines_stay_inside_quotes() {
        let mut grid = Grid::new(1, 1);
        grid.set(0, 0, CellValue::Text("a,b\nc".into())).unwrap();
        assert_eq!(to_csv(&grid), "\"a,b\nc\"");
    }
}
