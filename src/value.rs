//! Values flowing through formula evaluation.

use crate::cell::{CellValue, format_number, parse_number};
use crate::error::EvalError;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Numeric contents of a resolved range, row-major.
    List(Vec<Value>),
}

impl Value {
    /// Loose numeric view used by aggregates: numbers, booleans and numeric text.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => parse_number(s),
            Value::Empty | Value::List(_) => None,
        }
    }

    /// Strict numeric view for operators and scalar function arguments.
    pub fn to_number(&self) -> Result<f64, EvalError> {
        match self {
            Value::Empty => Ok(0.0),
            Value::List(_) => Err(EvalError::TypeMismatch("range used as a number".into())),
            other => other
                .coerce_number()
                .ok_or_else(|| EvalError::TypeMismatch(format!("{} is not a number", other.to_text()))),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::List(items) => items.iter().map(Value::to_text).collect::<Vec<_>>().join(","),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Empty => false,
            Value::Number(n) => *n != 0.0,
            Value::Boolean(b) => *b,
            Value::Text(s) => {
                if s.eq_ignore_ascii_case("FALSE") {
                    false
                } else {
                    !s.is_empty()
                }
            }
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Convert a final result into a storable cell value.
    pub fn into_cell_value(self) -> Result<CellValue, EvalError> {
        match self {
            Value::Empty => Ok(CellValue::Empty),
            Value::Number(n) if !n.is_finite() => Err(EvalError::NotFinite),
            // normalise -0
            Value::Number(n) => Ok(CellValue::Number(if n == 0.0 { 0.0 } else { n })),
            Value::Text(s) => Ok(CellValue::Text(s)),
            Value::Boolean(b) => Ok(CellValue::Boolean(b)),
            Value::List(_) => Err(EvalError::RangeResult),
        }
    }
}

/// Expand nested lists into a flat argument sequence.
pub fn flatten(args: &[Value]) -> Vec<&Value> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::List(items) => out.extend(flatten(items)),
            other => out.push(other),
        }
    }
    out
}
