use crate::cell::{CellValue, TEXT_PREFIX};
use crate::error::CsvError;
use crate::grid::Grid;
use std::error::Error;
use std::path::Path;

/// Build a grid from CSV text
///
/// Fields may be quoted (with `""` for a literal quote) and quoted fields may
/// span lines. Each field is read the same way typed input is, so numbers,
/// booleans and `=` formulas come back with their stored types. A field
/// starting with [`TEXT_PREFIX`] is always text, with the prefix removed.
/// Short rows are padded with empty cells.
///
/// # Arguments
/// * `text` - CSV content
///
/// # Returns
/// * `Result<Grid, CsvError>` - The grid, or the line of an unterminated quote
///
/// # Examples
/// ```
/// use testsheet::cell::CellValue;
/// use testsheet::loader::from_csv;
///
/// let grid = from_csv("\"1\",\"=A1*2\"\n\"x\"").unwrap();
/// assert_eq!((grid.rows, grid.cols), (2, 2));
/// assert_eq!(grid.get(0, 1), Ok(&CellValue::Formula("=A1*2".into())));
/// ```
pub fn from_csv(text: &str) -> Result<Grid, CsvError> {
    let rows: Vec<Vec<CellValue>> = parse_csv_records(text)?
        .into_iter()
        .map(|record| record.iter().map(|field| read_field(field)).collect())
        .collect();
    Ok(Grid::from_rows(rows))
}

fn read_field(field: &str) -> CellValue {
    match field.strip_prefix(TEXT_PREFIX) {
        Some(text) => CellValue::Text(text.to_string()),
        None => CellValue::from_input(field),
    }
}

/// Load a CSV file into a grid.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Grid, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(from_csv(&text)?)
}

// Split CSV text into records of unescaped fields.
fn parse_csv_records(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut record_started = false;
    let mut line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    // doubled quote inside a quoted field
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quote_line = line;
                record_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                record_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                record_started = false;
                line += 1;
            }
            _ => {
                field.push(c);
                record_started = true;
            }
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote(quote_line));
    }
    if record_started {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_fields() {
        let records = parse_csv_records("a,\"b,c\",\"say \"\"hi\"\"\"\r\n\"multi\nline\",x").unwrap();
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b,c".to_string(), "say \"hi\"".to_string()],
                vec!["multi\nline".to_string(), "x".to_string()],
            ]
        );
    }

    #[test]
    fn test_trailing_newline_adds_no_record() {
        assert_eq!(parse_csv_records("1,2\n").unwrap().len(), 1);
        assert!(parse_csv_records("").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            parse_csv_records("ok\n\"open,\nstill open"),
            Err(CsvError::UnterminatedQuote(2))
        );
    }

    #[test]
    fn test_text_prefix_forces_text() {
        let grid = from_csv("\"'007\",\"007\",\"'\",\"''x\",\"'TRUE\"").unwrap();
        assert_eq!(grid.get(0, 0), Ok(&CellValue::Text("007".into())));
        assert_eq!(grid.get(0, 1), Ok(&CellValue::Number(7.0)));
        assert_eq!(grid.get(0, 2), Ok(&CellValue::Text(String::new())));
        assert_eq!(grid.get(0, 3), Ok(&CellValue::Text("'x".into())));
        assert_eq!(grid.get(0, 4), Ok(&CellValue::Text("TRUE".into())));
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let grid = from_csv("1\n2,3,4").unwrap();
        assert_eq!((grid.rows, grid.cols), (2, 3));
        assert_eq!(grid.get(0, 2), Ok(&CellValue::Empty));
        assert_eq!(grid.get(1, 2), Ok(&CellValue::Number(4.0)));
    }
}
