//! Formula parser: formula text -> AST.
//!
//! Supports numbers, strings, TRUE/FALSE, cell refs (A1), ranges (A1:B5),
//! function calls (SUM(...)), arithmetic (+ - * / ^), concatenation (&)
//! and comparisons (= == <> != < > <= >=).
//!
//! Nesting and tree height are capped at [`MAX_DEPTH`], so the evaluator's
//! tree walk stays shallow whatever the input.

use crate::cell::{CellAddress, Range, parse_cell_id};
use crate::error::EvalError;

/// Deepest nesting (parentheses, calls, unary signs) and tallest AST accepted.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Cell(CellAddress),
    Range(Range),
    Function { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: Op, left: Box<Expr>, right: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Cell(CellAddress),
    /// Identifier directly followed by `(`.
    Func(String),
    Bool(bool),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    LParen,
    RParen,
    Colon,
    Comma,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

/// Parse a formula body (the leading `=` already stripped) into an AST.
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::UnexpectedEnd);
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let (expr, _) = parser.comparison()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::UnexpectedToken(format!("{:?}", token)));
    }
    Ok(expr)
}

fn single(c: char) -> Option<Token> {
    Some(match c {
        '+' => Token::Plus,
        '-' => Token::Minus,
        '*' => Token::Star,
        '/' => Token::Slash,
        '^' => Token::Caret,
        '&' => Token::Amp,
        '(' => Token::LParen,
        ')' => Token::RParen,
        ':' => Token::Colon,
        ',' => Token::Comma,
        _ => return None,
    })
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if let Some(token) = single(c) {
            tokens.push(token);
            chars.next();
            continue;
        }
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(EvalError::UnexpectedChar('!'));
                }
                tokens.push(Token::NotEq);
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::LtEq);
                    }
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::NotEq);
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::GtEq);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => {
                            // doubled quote is an escaped quote
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                s.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => return Err(EvalError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| EvalError::UnexpectedToken(num_str.clone()))?;
                tokens.push(Token::Number(num));
            }
            'A'..='Z' | 'a'..='z' | '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                // Function names win over cell tokens, so LOG10( is a call.
                let mut lookahead = chars.clone();
                while matches!(lookahead.peek(), Some(' ' | '\t')) {
                    lookahead.next();
                }
                if lookahead.peek() == Some(&'(') {
                    tokens.push(Token::Func(ident));
                } else if ident.eq_ignore_ascii_case("TRUE") {
                    tokens.push(Token::Bool(true));
                } else if ident.eq_ignore_ascii_case("FALSE") {
                    tokens.push(Token::Bool(false));
                } else if let Some((row, col)) = parse_cell_id(&ident) {
                    tokens.push(Token::Cell(CellAddress::new(row, col)));
                } else {
                    return Err(EvalError::UnknownName(ident));
                }
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// Height of a node whose tallest child has `height`; errors past MAX_DEPTH.
fn taller(height: usize) -> Result<usize, EvalError> {
    let height = height + 1;
    if height > MAX_DEPTH {
        return Err(EvalError::TooDeep(MAX_DEPTH));
    }
    Ok(height)
}

/// Recursive-descent parser. Every rule returns the parsed expression with
/// its tree height; `depth` counts the rules currently nested.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

type Parsed = Result<(Expr, usize), EvalError>;

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn unexpected(&self) -> EvalError {
        match self.peek() {
            Some(token) => EvalError::UnexpectedToken(format!("{:?}", token)),
            None => EvalError::UnexpectedEnd,
        }
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Parsed) -> Parsed {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let parsed = rule(self);
        self.depth -= 1;
        parsed
    }

    // Lowest precedence: comparison operators
    fn comparison(&mut self) -> Parsed {
        let (mut left, mut height) = self.concat()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Eq => Op::Eq,
                Token::NotEq => Op::NotEq,
                Token::Lt => Op::Lt,
                Token::Gt => Op::Gt,
                Token::LtEq => Op::LtEq,
                Token::GtEq => Op::GtEq,
                _ => break,
            };
            self.pos += 1;
            let (right, right_height) = self.concat()?;
            height = taller(height.max(right_height))?;
            left = binary(op, left, right);
        }

        Ok((left, height))
    }

    fn concat(&mut self) -> Parsed {
        let (mut left, mut height) = self.add_sub()?;

        while self.peek() == Some(&Token::Amp) {
            self.pos += 1;
            let (right, right_height) = self.add_sub()?;
            height = taller(height.max(right_height))?;
            left = binary(Op::Concat, left, right);
        }

        Ok((left, height))
    }

    fn add_sub(&mut self) -> Parsed {
        let (mut left, mut height) = self.mul_div()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            let (right, right_height) = self.mul_div()?;
            height = taller(height.max(right_height))?;
            left = binary(op, left, right);
        }

        Ok((left, height))
    }

    fn mul_div(&mut self) -> Parsed {
        let (mut left, mut height) = self.unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                _ => break,
            };
            self.pos += 1;
            let (right, right_height) = self.unary()?;
            height = taller(height.max(right_height))?;
            left = binary(op, left, right);
        }

        Ok((left, height))
    }

    fn unary(&mut self) -> Parsed {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.power(),
        };
        self.pos += 1;
        let (operand, height) = self.nested(Self::unary)?;
        Ok((
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            taller(height)?,
        ))
    }

    // Right-associative: 2^3^2 == 2^(3^2)
    fn power(&mut self) -> Parsed {
        let (base, height) = self.primary()?;

        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let (exponent, exponent_height) = self.nested(Self::unary)?;
            let height = taller(height.max(exponent_height))?;
            return Ok((binary(Op::Pow, base, exponent), height));
        }

        Ok((base, height))
    }

    fn primary(&mut self) -> Parsed {
        let token = self.peek().cloned().ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;

        match token {
            Token::Number(n) => Ok((Expr::Number(n), 1)),
            Token::Str(s) => Ok((Expr::Text(s), 1)),
            Token::Bool(b) => Ok((Expr::Boolean(b), 1)),
            Token::Cell(start) => {
                if self.peek() != Some(&Token::Colon) {
                    return Ok((Expr::Cell(start), 1));
                }
                self.pos += 1;
                match self.peek() {
                    Some(&Token::Cell(end)) => {
                        self.pos += 1;
                        Ok((Expr::Range(Range::new(start, end)), 1))
                    }
                    _ => Err(self.unexpected()),
                }
            }
            Token::Func(name) => self.call(name),
            Token::LParen => {
                let inner = self.nested(Self::comparison)?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                Ok(inner)
            }
            other => Err(EvalError::UnexpectedToken(format!("{:?}", other))),
        }
    }

    // `pos` points at the opening parenthesis.
    fn call(&mut self, name: String) -> Parsed {
        if self.peek() != Some(&Token::LParen) {
            return Err(EvalError::UnexpectedEnd);
        }
        self.pos += 1;
        let mut args = Vec::new();
        let mut height = 0;

        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok((Expr::Function { name, args }, 1));
        }

        loop {
            let (arg, arg_height) = self.nested(Self::comparison)?;
            height = height.max(arg_height);
            args.push(arg);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RParen) => {
                    self.pos += 1;
                    return Ok((Expr::Function { name, args }, taller(height)?));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }
}
