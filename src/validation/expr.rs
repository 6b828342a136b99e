//! expr.rs
//! Arithmetic sub-expressions inside rule formulas, e.g. `total_leads*booking_rate/100`.
//!
//! Grammar (usual precedence, left associative):
//!   expr   := term (('+' | '-') term)*
//!   term   := factor (('*' | '/') factor)*
//!   factor := '-' factor | number | identifier | '(' expr ')'

use super::error::RuleError;
use crate::store::ValueStore;
use std::iter::Peekable;
use std::str::CharIndices;

/// Deepest nesting of parentheses and unary minus accepted.
const MAX_DEPTH: usize = 64;
/// Longest expression accepted, in tokens. Bounds the depth of the parsed tree.
const MAX_TOKENS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Metric(String),
    Neg(Box<Expr>),
    Binary { op: ArithOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

impl Expr {
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0, text };
        let expr = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Evaluates against the store. Absent when any identifier is absent or a
    /// divisor is zero.
    pub fn eval(&self, values: &ValueStore) -> Option<f64> {
        let v = match self {
            Expr::Number(v) => *v,
            Expr::Metric(id) => values.get(id)?,
            Expr::Neg(inner) => -inner.eval(values)?,
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(values)?;
                let b = rhs.eval(values)?;
                match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div if b == 0.0 => return None,
                    ArithOp::Div => a / b,
                }
            }
        };
        v.is_finite().then_some(v)
    }

    /// Every identifier referenced, in order of appearance, without duplicates.
    pub fn metrics(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_metrics(&mut out);
        out
    }

    fn collect_metrics<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Metric(id) => {
                if !out.contains(&id.as_str()) {
                    out.push(id);
                }
            }
            Expr::Neg(inner) => inner.collect_metrics(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_metrics(out);
                rhs.collect_metrics(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<CharIndices<'_>> = text.char_indices().peekable();
    let error = |reason: String| RuleError::Expression { expr: text.to_string(), reason };

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let end = number_end(text, start);
                while chars.peek().is_some_and(|&(i, _)| i < end) {
                    chars.next();
                }
                let literal = &text[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| error(format!("bad number '{}'", literal)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = take_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                tokens.push(Token::Ident(text[start..end].to_string()));
            }
            other => return Err(error(format!("unexpected character '{}'", other))),
        }
        if tokens.len() > MAX_TOKENS {
            return Err(error(format!("expression longer than {} tokens", MAX_TOKENS)));
        }
    }
    if tokens.is_empty() {
        return Err(error("empty expression".to_string()));
    }
    Ok(tokens)
}

/// Byte offset just past a numeric literal starting at `start`: digits and
/// dots, then an optional exponent (`e`/`E`, optional sign, digits).
fn number_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut end = start;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
        end += 1;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    end
}

/// Consumes characters matching `pred`; returns the byte offset just past them.
fn take_while(chars: &mut Peekable<CharIndices<'_>>, pred: impl Fn(char) -> bool) -> usize {
    let mut end = 0;
    while let Some(&(i, c)) = chars.peek() {
        if !pred(c) {
            return i;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    text: &'a str,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: &str) -> RuleError {
        RuleError::Expression { expr: self.text.to_string(), reason: reason.to_string() }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn peek_op(&self, ops: &[char]) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(c)) if ops.contains(c) => Some(*c),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.term()?;
        while let Some(c) = self.peek_op(&['+', '-']) {
            self.pos += 1;
            let rhs = self.term()?;
            let op = if c == '+' { ArithOp::Add } else { ArithOp::Sub };
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.factor()?;
        while let Some(c) = self.peek_op(&['*', '/']) {
            self.pos += 1;
            let rhs = self.factor()?;
            let op = if c == '*' { ArithOp::Mul } else { ArithOp::Div };
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, RuleError> {
        let token = self.tokens.get(self.pos).ok_or_else(|| self.error("unexpected end of expression"))?;
        self.pos += 1;
        match token {
            Token::Op('-') => {
                self.descend()?;
                let inner = self.factor()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Token::Number(v) => Ok(Expr::Number(*v)),
            Token::Ident(id) => Ok(Expr::Metric(id.clone())),
            Token::Open => {
                self.descend()?;
                let inner = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        self.depth -= 1;
                        Ok(inner)
                    }
                    _ => Err(self.error("missing ')'")),
                }
            }
            Token::Close | Token::Op(_) => Err(self.error("expected a number, identifier or '('")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn store() -> ValueStore {
        [("total_leads", 100.0), ("reported_booking_rate", 40.0), ("a", 6.0), ("b", 3.0), ("zero", 0.0)]
            .into_iter()
            .collect()
    }

    #[rstest]
    #[case("total_leads*reported_booking_rate/100", 40.0)]
    #[case("a + b * 2", 12.0)]
    #[case("(a + b) * 2", 18.0)]
    #[case("a - b - 1", 2.0)]
    #[case("a / b / 2", 1.0)]
    #[case("-a + 10", 4.0)]
    #[case("2.5*4", 10.0)]
    #[case("total_leads", 100.0)]
    #[case("2e3/1e1", 200.0)]
    #[case("2.5e-1*4", 1.0)]
    #[case("1E+2 - a", 94.0)]
    fn test_eval(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(Expr::parse(text).unwrap().eval(&store()), Some(expected));
    }

    #[rstest]
    #[case("a * missing")]
    #[case("a / zero")]
    #[case("missing - missing")]
    fn test_absent(#[case] text: &str) {
        assert_eq!(Expr::parse(text).unwrap().eval(&store()), None);
    }

    #[rstest]
    #[case("")]
    #[case("a +")]
    #[case("(a + b")]
    #[case("a b")]
    #[case("a % b")]
    #[case("1..2")]
    #[case("*a")]
    fn test_syntax_errors(#[case] text: &str) {
        assert!(matches!(Expr::parse(text), Err(RuleError::Expression { .. })), "{text}");
    }

    #[test]
    fn test_exponent_requires_digits() {
        assert!(matches!(Expr::parse("1e"), Err(RuleError::Expression { .. })));
        assert!(matches!(Expr::parse("1e+"), Err(RuleError::Expression { .. })));
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(Expr::parse(&ok).unwrap().eval(&store()), Some(6.0));

        let deep = format!("{}a{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        match Expr::parse(&deep) {
            Err(RuleError::Expression { reason, .. }) => assert_eq!(reason, "expression nested too deeply"),
            other => panic!("unexpected {:?}", other),
        }
        let negations = format!("{}a", "-".repeat(MAX_DEPTH + 1));
        assert!(matches!(Expr::parse(&negations), Err(RuleError::Expression { .. })));
    }

    #[test]
    fn test_length_limit() {
        let long = vec!["a"; MAX_TOKENS].join("+");
        match Expr::parse(&long) {
            Err(RuleError::Expression { reason, .. }) => assert!(reason.contains("longer than")),
            other => panic!("unexpected {:?}", other),
        }
        let fits = vec!["a"; MAX_TOKENS / 2].join("+");
        assert_eq!(Expr::parse(&fits).unwrap().eval(&store()), Some(6.0 * (MAX_TOKENS / 2) as f64));
    }

    #[test]
    fn test_metrics_in_order_without_duplicates() {
        let expr = Expr::parse("b * a + b / 3").unwrap();
        assert_eq!(expr.metrics(), vec!["b", "a"]);
    }
}
