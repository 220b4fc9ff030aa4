//! Tree-walking formula evaluator.
//!
//! `evaluate` is total: every parse or runtime failure becomes the
//! [`ERROR_SENTINEL`] cell value. Callers that want the failure reason use
//! [`try_evaluate`].

use crate::cell::CellValue;
use crate::error::EvalError;
use crate::functions::{BUILTINS, FunctionTable};
use crate::parser::{Expr, Op, UnaryOp, parse};
use crate::reference::{EvalContext, resolve_cell, resolve_range};
use crate::value::Value;
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use std::cmp::Ordering;

pub const ERROR_SENTINEL: &str = "#ERROR!";
pub const CYCLE_SENTINEL: &str = "#CYCLE!";

lazy_static! {
    static ref ARITH_ONLY: Regex = Regex::new(r"^[\d\s+\-*/().]+$").unwrap();
}

/// Evaluate `formula` against `context` with the built-in function table.
pub fn evaluate(formula: &str, context: &EvalContext) -> CellValue {
    evaluate_with(formula, context, &BUILTINS)
}

pub fn evaluate_with(formula: &str, context: &EvalContext, functions: &FunctionTable) -> CellValue {
    match try_evaluate(formula, context, functions).and_then(Value::into_cell_value) {
        Ok(value) => value,
        Err(err) => {
            trace!("evaluation of {:?} failed: {}", formula, err);
            CellValue::Text(ERROR_SENTINEL.to_string())
        }
    }
}

pub fn try_evaluate(formula: &str, context: &EvalContext, functions: &FunctionTable) -> Result<Value, EvalError> {
    let body = formula.strip_prefix('=').unwrap_or(formula);
    let expr = parse(body)?;
    if ARITH_ONLY.is_match(body) {
        return arithmetic(&expr).map(Value::Number);
    }
    Evaluator { context, functions }.eval(&expr)
}

// Pure number arithmetic, no references or calls.
fn arithmetic(expr: &Expr) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Unary { op, operand } => {
            let x = arithmetic(operand)?;
            Ok(match op {
                UnaryOp::Neg => -x,
                UnaryOp::Plus => x,
            })
        }
        Expr::Binary { op, left, right } => apply_arithmetic(*op, arithmetic(left)?, arithmetic(right)?),
        other => Err(EvalError::UnexpectedToken(format!("{:?}", other))),
    }
}

fn apply_arithmetic(op: Op, a: f64, b: f64) -> Result<f64, EvalError> {
    match op {
        Op::Add => Ok(a + b),
        Op::Sub => Ok(a - b),
        Op::Mul => Ok(a * b),
        Op::Div if b == 0.0 => Err(EvalError::DivisionByZero),
        Op::Div => Ok(a / b),
        Op::Pow => Ok(a.powf(b)),
        other => Err(EvalError::UnexpectedToken(format!("{:?}", other))),
    }
}

struct Evaluator<'a> {
    context: &'a EvalContext,
    functions: &'a FunctionTable,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Cell(cell) => resolve_cell(*cell, self.context),
            Expr::Range(range) => Ok(resolve_range(*range, self.context)),
            Expr::Function { name, args } => self.call(name, args),
            Expr::Unary { op, operand } => {
                let x = self.number(operand)?;
                Ok(Value::Number(match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Plus => x,
                }))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
        }
    }

    /// Numeric operand. Cell references fall back to 0 for non-numeric
    /// content, literals and computed values must be numeric.
    fn number(&self, expr: &Expr) -> Result<f64, EvalError> {
        let value = self.eval(expr)?;
        match expr {
            Expr::Cell(_) => Ok(value.coerce_number().unwrap_or(0.0)),
            _ => value.to_number(),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        let spec = self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        spec.check_arity(args.len())?;

        if name == "IF" {
            let branch = if self.eval(&args[0])?.truthy() {
                args.get(1)
            } else {
                args.get(2)
            };
            return match branch {
                Some(expr) => self.eval(expr),
                None => Ok(Value::Boolean(false)),
            };
        }

        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;
        (spec.call)(&values)
    }

    fn binary(&self, op: Op, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        match op {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
                let (a, b) = (self.number(left)?, self.number(right)?);
                apply_arithmetic(op, a, b).map(Value::Number)
            }
            Op::Concat => {
                let (a, b) = (self.eval(left)?, self.eval(right)?);
                Ok(Value::Text(a.to_text() + &b.to_text()))
            }
            Op::Eq | Op::NotEq | Op::Lt | Op::Gt | Op::LtEq | Op::GtEq => {
                let ordering = compare(&self.eval(left)?, &self.eval(right)?);
                let result = match op {
                    Op::Eq => ordering == Ordering::Equal,
                    Op::NotEq => ordering != Ordering::Equal,
                    Op::Lt => ordering == Ordering::Less,
                    Op::Gt => ordering == Ordering::Greater,
                    Op::LtEq => ordering != Ordering::Greater,
                    _ => ordering != Ordering::Less,
                };
                Ok(Value::Boolean(result))
            }
        }
    }
}

/// Numbers compare numerically; anything else compares as case-insensitive text.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.coerce_number(), b.coerce_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_text().to_lowercase().cmp(&b.to_text().to_lowercase()),
    }
}
