use thiserror::Error;

/// Failure while parsing or evaluating a formula.
///
/// Never crosses the `evaluate` boundary: the evaluator turns every variant
/// into the `#ERROR!` sentinel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unexpected token {0}")]
    UnexpectedToken(String),
    #[error("unknown name {0}")]
    UnknownName(String),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("{name} takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid argument to {0}")]
    InvalidArgument(&'static str),
    #[error("cell {0} holds an error")]
    ErrorReference(String),
    #[error("cell {0} holds an unevaluated formula")]
    Unresolved(String),
    #[error("result is not a finite number")]
    NotFinite,
    #[error("a range cannot be the result of a formula")]
    RangeResult,
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Persistence failures surfaced by a [`crate::saving::SheetStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("invalid sheet id {0:?}")]
    InvalidId(String),
    #[error("save task failed: {0}")]
    Task(String),
    #[error("{0}")]
    Backend(String),
}

/// Name used by the persistence boundary.
pub type SaveError = StoreError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    #[error("unterminated quoted field starting on line {0}")]
    UnterminatedQuote(usize),
}
