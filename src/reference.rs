//! Reference and range resolution against an evaluation context.
//!
//! A context maps canonical cell ids (`"B7"`) to already-resolved values.
//! Formula cells must be evaluated by the caller before they appear here.

use crate::cell::{CellAddress, CellValue, Range, format_number};
use crate::error::EvalError;
use crate::value::Value;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Resolved cell values keyed by `A1`-style id.
pub type EvalContext = HashMap<String, CellValue>;

lazy_static! {
    static ref RANGE_TOKEN: Regex = Regex::new(r"\b([A-Z]+[0-9]+):([A-Z]+[0-9]+)\b").unwrap();
    static ref CELL_TOKEN: Regex = Regex::new(r"\b([A-Z]+[0-9]+)\b").unwrap();
}

/// Value of a single referenced cell. Missing cells read as `0`.
pub fn resolve_cell(cell: CellAddress, context: &EvalContext) -> Result<Value, EvalError> {
    let id = cell.id();
    match context.get(&id) {
        None | Some(CellValue::Empty) => Ok(Value::Number(0.0)),
        Some(CellValue::Number(n)) => Ok(Value::Number(*n)),
        Some(CellValue::Boolean(b)) => Ok(Value::Boolean(*b)),
        Some(CellValue::Formula(_)) => Err(EvalError::Unresolved(id)),
        Some(value @ CellValue::Text(_)) if value.is_error() => Err(EvalError::ErrorReference(id)),
        Some(CellValue::Text(s)) => Ok(Value::Text(s.clone())),
    }
}

/// Numeric values found in a range, row-major. Non-numeric and absent cells
/// are skipped.
pub fn resolve_range(range: Range, context: &EvalContext) -> Value {
    let values = range
        .cells()
        .filter_map(|cell| context.get(&cell.id()).and_then(CellValue::as_number))
        .map(Value::Number)
        .collect();
    Value::List(values)
}

/// Textual form of reference substitution, for previews and diagnostics.
///
/// Ranges become `[1,2,3]` lists of their numeric values; single cells become
/// bare numbers or double-quoted strings (missing cells become `"0"`).
/// Ranges are substituted first since their endpoints also match the cell
/// pattern.
pub fn substitute_references(formula: &str, context: &EvalContext) -> String {
    let body = formula.strip_prefix('=').unwrap_or(formula);

    let ranges_done = RANGE_TOKEN.replace_all(body, |caps: &Captures| {
        match Range::parse(&caps[0]) {
            Some(range) => {
                let Value::List(items) = resolve_range(range, context) else {
                    return caps[0].to_string();
                };
                let parts: Vec<String> = items.iter().map(Value::to_text).collect();
                format!("[{}]", parts.join(","))
            }
            None => caps[0].to_string(),
        }
    });

    CELL_TOKEN
        .replace_all(&ranges_done, |caps: &Captures| {
            let token = &caps[1];
            // function names such as LOG10( are not references
            let end = caps.get(1).map_or(0, |m| m.end());
            if ranges_done[end..].trim_start().starts_with('(') || CellAddress::parse(token).is_none() {
                return token.to_string();
            }
            match context.get(token) {
                Some(CellValue::Number(n)) => format_number(*n),
                Some(other) => quote(&other.raw_text()),
                None => quote("0"),
            }
        })
        .into_owned()
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}
