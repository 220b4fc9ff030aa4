//! Built-in formula functions.
//!
//! Conventions:
//! - Names are ALL CAPS and looked up exactly (`SUM`, not `sum`).
//! - Variadic math and logical functions flatten range lists before reducing.
//! - Aggregates skip values that are not numeric-coercible instead of failing.
//!
//! The table is immutable once built; [`BUILTINS`] is the shared default and
//! callers may build and pass their own.

use crate::error::EvalError;
use crate::value::{Value, flatten};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use lazy_static::lazy_static;
use rand::Rng;
use std::collections::HashMap;

pub type Builtin = fn(&[Value]) -> Result<Value, EvalError>;

#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions.
    pub max_args: Option<usize>,
    pub call: Builtin,
}

impl FunctionSpec {
    pub fn check_arity(&self, got: usize) -> Result<(), EvalError> {
        let too_many = self.max_args.is_some_and(|max| got > max);
        if got < self.min_args || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => max.to_string(),
                Some(max) => format!("{}..{}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(EvalError::Arity {
                name: self.name.to_string(),
                expected,
                got,
            });
        }
        Ok(())
    }
}

pub struct FunctionTable {
    entries: HashMap<&'static str, FunctionSpec>,
}

lazy_static! {
    pub static ref BUILTINS: FunctionTable = FunctionTable::builtin();
}

const VARIADIC: Option<usize> = None;

impl FunctionTable {
    pub fn empty() -> Self {
        FunctionTable {
            entries: HashMap::new(),
        }
    }

    /// The standard math, text, date and logical library.
    pub fn builtin() -> Self {
        let mut table = FunctionTable::empty();
        let specs: &[(&'static str, usize, Option<usize>, Builtin)] = &[
            // math
            ("SUM", 0, VARIADIC, sum),
            ("AVERAGE", 1, VARIADIC, average),
            ("COUNT", 0, VARIADIC, count),
            ("COUNTA", 0, VARIADIC, counta),
            ("MAX", 0, VARIADIC, max),
            ("MIN", 0, VARIADIC, min),
            ("POWER", 2, Some(2), power),
            ("SQRT", 1, Some(1), sqrt),
            ("ABS", 1, Some(1), |a| unary_math(a, f64::abs)),
            ("ROUND", 1, Some(2), round),
            ("CEILING", 1, Some(2), ceiling),
            ("FLOOR", 1, Some(2), floor),
            ("MOD", 2, Some(2), modulo),
            ("PI", 0, Some(0), |_| Ok(Value::Number(std::f64::consts::PI))),
            ("E", 0, Some(0), |_| Ok(Value::Number(std::f64::consts::E))),
            ("SIN", 1, Some(1), |a| unary_math(a, f64::sin)),
            ("COS", 1, Some(1), |a| unary_math(a, f64::cos)),
            ("TAN", 1, Some(1), |a| unary_math(a, f64::tan)),
            ("ASIN", 1, Some(1), asin),
            ("ACOS", 1, Some(1), acos),
            ("ATAN", 1, Some(1), |a| unary_math(a, f64::atan)),
            ("LOG", 1, Some(2), log),
            ("LOG10", 1, Some(1), log10),
            ("EXP", 1, Some(1), |a| unary_math(a, f64::exp)),
            ("RANDOM", 0, Some(0), random),
            ("RANDBETWEEN", 2, Some(2), randbetween),
            // text
            ("CONCATENATE", 0, VARIADIC, concatenate),
            ("LEFT", 1, Some(2), left),
            ("RIGHT", 1, Some(2), right),
            ("MID", 3, Some(3), mid),
            ("LEN", 1, Some(1), len),
            ("UPPER", 1, Some(1), |a| Ok(Value::Text(a[0].to_text().to_uppercase()))),
            ("LOWER", 1, Some(1), |a| Ok(Value::Text(a[0].to_text().to_lowercase()))),
            // date
            ("TODAY", 0, Some(0), today),
            ("NOW", 0, Some(0), now),
            ("YEAR", 1, Some(1), |a| date_part(a, "YEAR", |d| d.year() as f64)),
            ("MONTH", 1, Some(1), |a| date_part(a, "MONTH", |d| d.month() as f64)),
            ("DAY", 1, Some(1), |a| date_part(a, "DAY", |d| d.day() as f64)),
            // logical
            ("IF", 2, Some(3), if_),
            ("AND", 1, VARIADIC, and),
            ("OR", 1, VARIADIC, or),
            ("NOT", 1, Some(1), |a| Ok(Value::Boolean(!a[0].truthy()))),
        ];
        for &(name, min_args, max_args, call) in specs {
            table.register(FunctionSpec {
                name,
                min_args,
                max_args,
                call,
            });
        }
        table
    }

    pub fn register(&mut self, spec: FunctionSpec) {
        self.entries.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Check arity and invoke `name` with already-evaluated arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let spec = self
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        spec.check_arity(args.len())?;
        (spec.call)(args)
    }
}

fn numbers(args: &[Value]) -> Vec<f64> {
    flatten(args).iter().filter_map(|v| v.coerce_number()).collect()
}

fn number_arg(args: &[Value], index: usize, default: f64) -> Result<f64, EvalError> {
    match args.get(index) {
        Some(v) => v.to_number(),
        None => Ok(default),
    }
}

// Argument feeding an integer count or index; NaN and infinities are rejected.
fn finite_arg(args: &[Value], index: usize, default: f64, name: &'static str) -> Result<f64, EvalError> {
    let n = number_arg(args, index, default)?;
    if !n.is_finite() {
        return Err(EvalError::InvalidArgument(name));
    }
    Ok(n)
}

fn unary_math(args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    Ok(Value::Number(f(args[0].to_number()?)))
}

fn sum(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(numbers(args).iter().sum()))
}

fn average(args: &[Value]) -> Result<Value, EvalError> {
    let values = numbers(args);
    if values.is_empty() {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
}

fn count(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(numbers(args).len() as f64))
}

fn counta(args: &[Value]) -> Result<Value, EvalError> {
    let n = flatten(args).iter().filter(|v| !v.is_blank()).count();
    Ok(Value::Number(n as f64))
}

fn max(args: &[Value]) -> Result<Value, EvalError> {
    let values = numbers(args);
    Ok(Value::Number(values.into_iter().reduce(f64::max).unwrap_or(0.0)))
}

fn min(args: &[Value]) -> Result<Value, EvalError> {
    let values = numbers(args);
    Ok(Value::Number(values.into_iter().reduce(f64::min).unwrap_or(0.0)))
}

fn power(args: &[Value]) -> Result<Value, EvalError> {
    let result = args[0].to_number()?.powf(args[1].to_number()?);
    if !result.is_finite() {
        return Err(EvalError::NotFinite);
    }
    Ok(Value::Number(result))
}

fn sqrt(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    if x < 0.0 {
        return Err(EvalError::InvalidArgument("SQRT"));
    }
    Ok(Value::Number(x.sqrt()))
}

/// Half away from zero; negative `digits` round left of the decimal point.
fn round(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    let digits = finite_arg(args, 1, 0.0, "ROUND")?.trunc().clamp(-308.0, 308.0) as i32;
    let factor = 10f64.powi(digits);
    Ok(Value::Number((x * factor).round() / factor))
}

fn significance(args: &[Value], name: &'static str) -> Result<f64, EvalError> {
    let step = number_arg(args, 1, 1.0)?;
    if step == 0.0 {
        return Err(EvalError::InvalidArgument(name));
    }
    Ok(step.abs())
}

fn ceiling(args: &[Value]) -> Result<Value, EvalError> {
    let step = significance(args, "CEILING")?;
    Ok(Value::Number((args[0].to_number()? / step).ceil() * step))
}

fn floor(args: &[Value]) -> Result<Value, EvalError> {
    let step = significance(args, "FLOOR")?;
    Ok(Value::Number((args[0].to_number()? / step).floor() * step))
}

/// Result takes the sign of the divisor.
fn modulo(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (args[0].to_number()?, args[1].to_number()?);
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Number(a - b * (a / b).floor()))
}

fn asin(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(EvalError::InvalidArgument("ASIN"));
    }
    Ok(Value::Number(x.asin()))
}

fn acos(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(EvalError::InvalidArgument("ACOS"));
    }
    Ok(Value::Number(x.acos()))
}

fn log(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    if x <= 0.0 {
        return Err(EvalError::InvalidArgument("LOG"));
    }
    match args.get(1) {
        None => Ok(Value::Number(x.ln())),
        Some(base) => {
            let base = base.to_number()?;
            if base <= 0.0 || base == 1.0 {
                return Err(EvalError::InvalidArgument("LOG"));
            }
            Ok(Value::Number(x.log(base)))
        }
    }
}

fn log10(args: &[Value]) -> Result<Value, EvalError> {
    let x = args[0].to_number()?;
    if x <= 0.0 {
        return Err(EvalError::InvalidArgument("LOG10"));
    }
    Ok(Value::Number(x.log10()))
}

fn random(_args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(rand::thread_rng().gen_range(0.0..1.0)))
}

fn randbetween(args: &[Value]) -> Result<Value, EvalError> {
    let low = finite_arg(args, 0, 0.0, "RANDBETWEEN")?.ceil();
    let high = finite_arg(args, 1, 0.0, "RANDBETWEEN")?.floor();
    if low > high {
        return Err(EvalError::InvalidArgument("RANDBETWEEN"));
    }
    let n = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok(Value::Number(n as f64))
}

fn concatenate(args: &[Value]) -> Result<Value, EvalError> {
    let text: String = flatten(args).iter().map(|v| v.to_text()).collect();
    Ok(Value::Text(text))
}

fn char_count_arg(args: &[Value], index: usize, default: f64, name: &'static str) -> Result<usize, EvalError> {
    let n = finite_arg(args, index, default, name)?;
    if n < 0.0 {
        return Err(EvalError::InvalidArgument(name));
    }
    Ok(n.trunc() as usize)
}

fn left(args: &[Value]) -> Result<Value, EvalError> {
    let n = char_count_arg(args, 1, 1.0, "LEFT")?;
    Ok(Value::Text(args[0].to_text().chars().take(n).collect()))
}

fn right(args: &[Value]) -> Result<Value, EvalError> {
    let n = char_count_arg(args, 1, 1.0, "RIGHT")?;
    let chars: Vec<char> = args[0].to_text().chars().collect();
    let skip = chars.len().saturating_sub(n);
    Ok(Value::Text(chars[skip..].iter().collect()))
}

/// `start` is 1-based.
fn mid(args: &[Value]) -> Result<Value, EvalError> {
    let start = finite_arg(args, 1, 1.0, "MID")?.trunc();
    if start < 1.0 {
        return Err(EvalError::InvalidArgument("MID"));
    }
    let n = char_count_arg(args, 2, 0.0, "MID")?;
    let text: String = args[0]
        .to_text()
        .chars()
        .skip((start as usize).saturating_sub(1))
        .take(n)
        .collect();
    Ok(Value::Text(text))
}

fn len(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Number(args[0].to_text().chars().count() as f64))
}

fn today(_args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Text(Local::now().format("%Y-%m-%d").to_string()))
}

fn now(_args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Text(Local::now().to_rfc3339()))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

fn date_part(args: &[Value], name: &'static str, part: fn(NaiveDate) -> f64) -> Result<Value, EvalError> {
    let date = parse_date(&args[0].to_text()).ok_or(EvalError::InvalidArgument(name))?;
    Ok(Value::Number(part(date)))
}

// The evaluator short-circuits IF; this eager form backs direct table calls.
fn if_(args: &[Value]) -> Result<Value, EvalError> {
    if args[0].truthy() {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(Value::Boolean(false)))
    }
}

fn and(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Boolean(flatten(args).iter().all(|v| v.truthy())))
}

fn or(args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Boolean(flatten(args).iter().any(|v| v.truthy())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
        BUILTINS.call(name, args)
    }

    #[test]
    fn test_aggregates_flatten_lists() {
        let args = [num(1.0), Value::List(vec![num(2.0), num(3.0)]), text("x")];
        assert_eq!(call("SUM", &args), Ok(num(6.0)));
        assert_eq!(call("AVERAGE", &args), Ok(num(2.0)));
        assert_eq!(call("COUNT", &args), Ok(num(3.0)));
        assert_eq!(call("COUNTA", &args), Ok(num(4.0)));
        assert_eq!(call("MAX", &args), Ok(num(3.0)));
        assert_eq!(call("MIN", &args), Ok(num(1.0)));
    }

    #[test]
    fn test_empty_aggregates() {
        assert_eq!(call("SUM", &[]), Ok(num(0.0)));
        assert_eq!(call("MAX", &[Value::List(vec![])]), Ok(num(0.0)));
        assert_eq!(call("AVERAGE", &[text("a")]), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_rounding_family() {
        assert_eq!(call("ROUND", &[num(2.5)]), Ok(num(3.0)));
        assert_eq!(call("ROUND", &[num(-2.5)]), Ok(num(-3.0)));
        assert_eq!(call("ROUND", &[num(3.14159), num(2.0)]), Ok(num(3.14)));
        assert_eq!(call("ROUND", &[num(1234.0), num(-2.0)]), Ok(num(1200.0)));
        assert_eq!(call("CEILING", &[num(4.2)]), Ok(num(5.0)));
        assert_eq!(call("FLOOR", &[num(4.8)]), Ok(num(4.0)));
        assert_eq!(call("CEILING", &[num(7.0), num(5.0)]), Ok(num(10.0)));
    }

    #[test]
    fn test_math_domain_errors() {
        assert!(call("SQRT", &[num(-1.0)]).is_err());
        assert!(call("LOG", &[num(0.0)]).is_err());
        assert!(call("LOG10", &[num(-5.0)]).is_err());
        assert!(call("ASIN", &[num(2.0)]).is_err());
        assert!(call("MOD", &[num(5.0), num(0.0)]).is_err());
        assert_eq!(call("MOD", &[num(-7.0), num(3.0)]), Ok(num(2.0)));
        assert_eq!(call("LOG", &[num(8.0), num(2.0)]), Ok(num(3.0)));
        assert_eq!(call("POWER", &[num(2.0), num(10.0)]), Ok(num(1024.0)));
    }

    #[test]
    fn test_randbetween_bounds() {
        for _ in 0..200 {
            let Ok(Value::Number(n)) = call("RANDBETWEEN", &[num(1.0), num(3.0)]) else {
                panic!("RANDBETWEEN should return a number");
            };
            assert!((1.0..=3.0).contains(&n));
            assert_eq!(n.fract(), 0.0);
        }
        assert!(call("RANDBETWEEN", &[num(5.0), num(1.0)]).is_err());
        let Ok(Value::Number(r)) = call("RANDOM", &[]) else {
            panic!("RANDOM should return a number");
        };
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_non_finite_counts_are_rejected() {
        let nan = num(f64::NAN);
        let inf = num(f64::INFINITY);
        assert_eq!(call("MID", &[text("abc"), nan.clone(), num(1.0)]), Err(EvalError::InvalidArgument("MID")));
        assert_eq!(call("MID", &[text("abc"), num(1.0), inf.clone()]), Err(EvalError::InvalidArgument("MID")));
        assert_eq!(call("LEFT", &[text("abc"), nan.clone()]), Err(EvalError::InvalidArgument("LEFT")));
        assert_eq!(call("RIGHT", &[text("abc"), inf.clone()]), Err(EvalError::InvalidArgument("RIGHT")));
        assert_eq!(
            call("RANDBETWEEN", &[num(5.0), nan.clone()]),
            Err(EvalError::InvalidArgument("RANDBETWEEN"))
        );
        assert_eq!(
            call("RANDBETWEEN", &[inf.clone(), num(5.0)]),
            Err(EvalError::InvalidArgument("RANDBETWEEN"))
        );
        assert_eq!(call("ROUND", &[num(1.5), nan]), Err(EvalError::InvalidArgument("ROUND")));
        assert_eq!(call("POWER", &[num(-1.0), num(0.5)]), Err(EvalError::NotFinite));
        assert_eq!(call("MID", &[text("abc"), num(1e300), num(1.0)]), Ok(text("")));
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(call("LEFT", &[text("héllo"), num(2.0)]), Ok(text("hé")));
        assert_eq!(call("LEFT", &[text("abc")]), Ok(text("a")));
        assert_eq!(call("RIGHT", &[text("abc"), num(5.0)]), Ok(text("abc")));
        assert_eq!(call("MID", &[text("abcdef"), num(2.0), num(3.0)]), Ok(text("bcd")));
        assert!(call("MID", &[text("abc"), num(0.0), num(1.0)]).is_err());
        assert_eq!(call("LEN", &[text("héllo")]), Ok(num(5.0)));
        assert_eq!(call("UPPER", &[text("abc")]), Ok(text("ABC")));
        assert_eq!(
            call("CONCATENATE", &[text("a"), num(1.0), Value::Boolean(true)]),
            Ok(text("a1TRUE"))
        );
    }

    #[test]
    fn test_date_functions() {
        assert_eq!(call("YEAR", &[text("2024-03-15")]), Ok(num(2024.0)));
        assert_eq!(call("MONTH", &[text("2024-03-15T10:00:00+00:00")]), Ok(num(3.0)));
        assert_eq!(call("DAY", &[text("2024-03-15")]), Ok(num(15.0)));
        assert!(call("DAY", &[text("not a date")]).is_err());
        let Ok(Value::Text(today)) = call("TODAY", &[]) else {
            panic!("TODAY should return text");
        };
        assert!(parse_date(&today).is_some());
        let Ok(Value::Text(now)) = call("NOW", &[]) else {
            panic!("NOW should return text");
        };
        assert!(parse_date(&now).is_some());
    }

    #[test]
    fn test_logical_functions() {
        assert_eq!(call("AND", &[num(1.0), Value::Boolean(true)]), Ok(Value::Boolean(true)));
        assert_eq!(call("AND", &[num(1.0), num(0.0)]), Ok(Value::Boolean(false)));
        assert_eq!(call("OR", &[num(0.0), text("yes")]), Ok(Value::Boolean(true)));
        assert_eq!(call("NOT", &[num(0.0)]), Ok(Value::Boolean(true)));
        assert_eq!(call("IF", &[num(0.0), num(1.0)]), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_arity_and_unknown() {
        assert!(matches!(call("SQRT", &[]), Err(EvalError::Arity { .. })));
        assert!(matches!(call("PI", &[num(1.0)]), Err(EvalError::Arity { .. })));
        assert_eq!(
            call("NOPE", &[]),
            Err(EvalError::UnknownFunction("NOPE".to_string()))
        );
        assert!(BUILTINS.contains("RANDBETWEEN"));
        assert!(!BUILTINS.contains("sum"));
    }
}
