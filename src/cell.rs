use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw content stored in a grid cell.
///
/// Formulas are kept as their source text (including the leading `=`); the
/// displayed value of a formula cell is produced by the evaluator.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Formula(String),
}

impl CellValue {
    /// Interpret text typed by the user into a cell.
    pub fn from_input(input: &str) -> Self {
        if input.is_empty() {
            return CellValue::Empty;
        }
        if input.starts_with('=') {
            return CellValue::Formula(input.to_string());
        }
        if input.eq_ignore_ascii_case("TRUE") {
            return CellValue::Boolean(true);
        }
        if input.eq_ignore_ascii_case("FALSE") {
            return CellValue::Boolean(false);
        }
        match parse_number(input) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(input.to_string()),
        }
    }

    /// The text a user would see in the editor for this cell, formulas unevaluated.
    pub fn raw_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) | CellValue::Formula(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for the `#ERROR!` and `#CYCLE!` sentinels.
    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Text(s) if s == crate::evaluator::ERROR_SENTINEL || s == crate::evaluator::CYCLE_SENTINEL)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_text())
    }
}

/// Parse a decimal number the way cell input and numeric coercion accept it.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Reject "inf", "NaN" and friends that f64::from_str would accept.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Marks a CSV field as literal text, e.g. `'007` or `'=not a formula`.
pub const TEXT_PREFIX: char = '\'';

/// Integral values print without a fractional part, everything else uses the
/// shortest round-tripping representation.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Zero-based row/column position of a cell.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        CellAddress { row, col }
    }

    /// Canonical `A1`-style id.
    pub fn id(&self) -> String {
        cell_id(self.row, self.col)
    }

    pub fn parse(id: &str) -> Option<Self> {
        parse_cell_id(id).map(|(row, col)| CellAddress { row, col })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.col), self.row + 1)
    }
}

/// Rectangular span of cells, inclusive on both ends and always normalized.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl Range {
    /// Build a range from two corners given in any order.
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Range {
            min_row: a.row.min(b.row),
            max_row: a.row.max(b.row),
            min_col: a.col.min(b.col),
            max_col: a.col.max(b.col),
        }
    }

    pub fn single(cell: CellAddress) -> Self {
        Range::new(cell, cell)
    }

    /// Parse `A1:B10` (corners in any order).
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.split_once(':')?;
        Some(Range::new(
            CellAddress::parse(start.trim())?,
            CellAddress::parse(end.trim())?,
        ))
    }

    pub fn top_left(&self) -> CellAddress {
        CellAddress::new(self.min_row, self.min_col)
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Number of cells covered, `None` on overflow.
    pub fn cell_count(&self) -> Option<usize> {
        self.height().checked_mul(self.width())
    }

    pub fn contains(&self, cell: CellAddress) -> bool {
        cell.row >= self.min_row
            && cell.row <= self.max_row
            && cell.col >= self.min_col
            && cell.col <= self.max_col
    }

    /// Row-major iteration over every covered cell.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + use<> {
        let (min_col, max_col) = (self.min_col, self.max_col);
        (self.min_row..=self.max_row)
            .flat_map(move |row| (min_col..=max_col).map(move |col| CellAddress::new(row, col)))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            CellAddress::new(self.min_row, self.min_col),
            CellAddress::new(self.max_row, self.max_col)
        )
    }
}

/// Convert a zero-based column index to letters (0 -> A, 25 -> Z, 26 -> AA).
pub fn column_label(index: usize) -> String {
    let mut n = index as u128 + 1;
    let mut result = String::new();
    while n > 0 {
        n -= 1;
        result.push(((n % 26) as u8 + b'A') as char);
        n /= 26;
    }
    result.chars().rev().collect()
}

/// Inverse of [`column_label`]. Returns `None` for empty, non-letter or
/// overflowing input.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        let digit = (c as u8 - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc - 1)
}

/// `A1`-style id for a zero-based row/column.
pub fn cell_id(row: usize, col: usize) -> String {
    format!("{}{}", column_label(col), row + 1)
}

/// Parse an `A1`-style id into a zero-based `(row, col)`.
pub fn parse_cell_id(cell_name: &str) -> Option<(usize, usize)> {
    let split = cell_name.find(|c: char| !c.is_ascii_uppercase())?;
    let (letters, digits) = cell_name.split_at(split);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let col = column_index(letters)?;
    let row = digits.parse::<usize>().ok()?.checked_sub(1)?;
    Some((row, col))
}
