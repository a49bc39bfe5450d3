//! Conditional expression language.
//!
//! Expressions are what appears between the parentheses of `@IF(...)`:
//!
//! ```text
//! or         := and ("OR" and)*
//! and        := not ("AND" not)*
//! not        := "NOT" not | comparison
//! comparison := primary (("==" | "!=" | "<" | ">" | "<=" | ">=") primary)?
//! primary    := literal | identifier | "{" identifier "}" | "(" or ")"
//! ```
//!
//! Literals are quoted strings, numbers and `true`/`false`. Any other bare word
//! is a variable looked up in the [`VariableContext`]; unbound variables are
//! the empty string.

use std::fmt;

use crate::value::{parse_number, Value, VariableContext};

/// Errors produced while parsing an expression.
///
/// Offsets are byte offsets into the expression text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected end of expression at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("Unexpected `{token}` at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("Unknown operator `{operator}` at offset {offset}")]
    UnknownOperator { operator: String, offset: usize },

    #[error("Unbalanced parenthesis at offset {offset}")]
    UnbalancedParens { offset: usize },

    #[error("Unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Invalid variable reference at offset {offset}")]
    InvalidReference { offset: usize },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            ">" => Some(CompareOp::Gt),
            "<=" => Some(CompareOp::Le),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse expression text.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
        };
        let expr = parser.parse_or()?;

        match parser.peek() {
            None => Ok(expr),
            Some(Token {
                kind: TokenKind::RParen,
                offset,
            }) => Err(ExpressionError::UnbalancedParens { offset: *offset }),
            Some(token) => Err(token.unexpected()),
        }
    }

    /// Evaluate this expression as a condition.
    pub fn evaluate(&self, ctx: &VariableContext) -> bool {
        self.value(ctx).is_truthy()
    }

    fn value(&self, ctx: &VariableContext) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Variable(name) => ctx.resolve(name),
            Expr::Compare { op, lhs, rhs } => {
                Value::Boolean(compare(*op, &lhs.value(ctx), &rhs.value(ctx)))
            }
            Expr::Not(inner) => Value::Boolean(!inner.evaluate(ctx)),
            Expr::And(lhs, rhs) => Value::Boolean(lhs.evaluate(ctx) && rhs.evaluate(ctx)),
            Expr::Or(lhs, rhs) => Value::Boolean(lhs.evaluate(ctx) || rhs.evaluate(ctx)),
        }
    }
}

/// Parse and evaluate an expression in one step.
pub fn evaluate(source: &str, ctx: &VariableContext) -> Result<bool, ExpressionError> {
    Ok(Expr::parse(source)?.evaluate(ctx))
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(lhs, rhs),
        CompareOp::Ne => !values_equal(lhs, rhs),
        CompareOp::Lt | CompareOp::Gt | CompareOp::Le | CompareOp::Ge => {
            let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
                tracing::debug!(
                    "Comparison {:?} {} {:?} is not numeric, evaluating to false",
                    lhs,
                    op.symbol(),
                    rhs
                );
                return false;
            };
            match op {
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
                CompareOp::Le => a <= b,
                _ => a >= b,
            }
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number { value: a, .. }, Value::Number { value: b, .. }) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        _ => lhs.to_string() == rhs.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Compare(CompareOp),
    And,
    Or,
    Not,
    Literal(Value),
    Ident(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::Compare(op) => f.write_str(op.symbol()),
            TokenKind::And => f.write_str("AND"),
            TokenKind::Or => f.write_str("OR"),
            TokenKind::Not => f.write_str("NOT"),
            TokenKind::Literal(Value::String(s)) => write!(f, "\"{}\"", s),
            TokenKind::Literal(value) => write!(f, "{}", value),
            TokenKind::Ident(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

impl Token {
    fn unexpected(&self) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            token: self.kind.to_string(),
            offset: self.offset,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+' | '$')
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>')
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(ExpressionError::UnterminatedString { offset: start });
                }
                TokenKind::Literal(Value::String(value))
            }
            '{' => {
                chars.next();
                let close = chars.by_ref().find(|&(_, ch)| ch == '}').map(|(i, _)| i);
                let Some(close) = close else {
                    return Err(ExpressionError::InvalidReference { offset: start });
                };
                let name = source[start + 1..close].trim();
                if name.is_empty() || !name.chars().all(is_word_char) {
                    return Err(ExpressionError::InvalidReference { offset: start });
                }
                TokenKind::Ident(name.to_string())
            }
            c if is_operator_char(c) => {
                let end = take_while(&mut chars, is_operator_char);
                let symbol = &source[start..end];
                let op = CompareOp::from_symbol(symbol).ok_or_else(|| {
                    ExpressionError::UnknownOperator {
                        operator: symbol.to_string(),
                        offset: start,
                    }
                })?;
                TokenKind::Compare(op)
            }
            c if is_word_char(c) => {
                let end = take_while(&mut chars, is_word_char);
                classify_word(&source[start..end])
            }
            _ => {
                let end = take_while(&mut chars, |ch| {
                    !ch.is_whitespace()
                        && !is_word_char(ch)
                        && !matches!(ch, '(' | ')' | '"' | '\'' | '{')
                });
                return Err(ExpressionError::UnknownOperator {
                    operator: source[start..end].to_string(),
                    offset: start,
                });
            }
        };

        tokens.push(Token {
            kind,
            offset: start,
        });
    }

    Ok(tokens)
}

/// Consume characters while `pred` holds, returning the end byte offset.
fn take_while(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    pred: impl Fn(char) -> bool,
) -> usize {
    let mut end = chars.peek().map(|&(i, _)| i).unwrap_or(0);
    while let Some(&(i, ch)) = chars.peek() {
        if !pred(ch) {
            break;
        }
        end = i + ch.len_utf8();
        chars.next();
    }
    end
}

fn classify_word(word: &str) -> TokenKind {
    match word {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "true" => TokenKind::Literal(Value::Boolean(true)),
        "false" => TokenKind::Literal(Value::Boolean(false)),
        _ => match parse_number(word) {
            Some(value) => TokenKind::Literal(Value::Number {
                value,
                text: word.to_string(),
            }),
            None => TokenKind::Ident(word.to_string()),
        },
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn next(&mut self) -> Result<&'t Token, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(ExpressionError::UnexpectedEnd { offset: self.end })?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_not()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.pos += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek_kind() == Some(&TokenKind::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.parse_primary()?;

        let Some(&TokenKind::Compare(op)) = self.peek_kind() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_primary()?;

        // Comparisons do not chain.
        if let Some(token) = self.peek() {
            if matches!(token.kind, TokenKind::Compare(_)) {
                return Err(token.unexpected());
            }
        }

        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.next()?;
        match &token.kind {
            TokenKind::Literal(value) => Ok(Expr::Literal(value.clone())),
            TokenKind::Ident(name) => Ok(Expr::Variable(name.clone())),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.peek_kind() {
                    Some(TokenKind::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some(_) => Err(self.tokens[self.pos].unexpected()),
                    None => Err(ExpressionError::UnbalancedParens {
                        offset: token.offset,
                    }),
                }
            }
            TokenKind::RParen => Err(ExpressionError::UnbalancedParens {
                offset: token.offset,
            }),
            _ => Err(token.unexpected()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> VariableContext {
        let mut ctx = VariableContext::new();
        for (name, raw) in pairs {
            ctx.set_raw(*name, raw);
        }
        ctx
    }

    fn eval(source: &str, ctx: &VariableContext) -> bool {
        evaluate(source, ctx).unwrap()
    }

    #[test]
    fn numeric_comparisons() {
        let empty = VariableContext::new();

        assert!(eval("5 > 3", &empty));
        assert!(eval("3 <= 3", &empty));
        assert!(eval("-2 < 1.5", &empty));
        assert!(!eval("2 >= 10", &empty));
    }

    #[test]
    fn string_operand_in_ordering_comparison_is_false() {
        let empty = VariableContext::new();

        assert!(!eval("\"5\" > 3", &empty));
        assert!(!eval("\"5\" < 3", &empty));
        assert!(!eval("missing > 0", &empty));
    }

    #[test]
    fn equality_across_types_compares_string_forms() {
        let empty = VariableContext::new();

        assert!(eval("\"5\" == 5", &empty));
        assert!(eval("'true' == true", &empty));
        assert!(eval("5.0 == 5", &empty));
        assert!(eval("\"a\" != \"b\"", &empty));
    }

    #[test]
    fn string_equality_uses_numbers_as_written() {
        let vars = ctx(&[("version", "1.10"), ("code", "007")]);

        assert!(eval("version == \"1.10\"", &vars));
        assert!(eval("version != \"1.1\"", &vars));
        assert!(eval("code == '007'", &vars));
        assert!(eval("code == 7", &vars));
        assert!(eval("version > 1.09", &vars));
    }

    #[test]
    fn identifiers_resolve_against_context() {
        let vars = ctx(&[("count", "5"), ("mode", "dark"), ("enabled", "true")]);

        assert!(eval("count > 3", &vars));
        assert!(eval("mode == \"dark\"", &vars));
        assert!(eval("{mode} == 'dark'", &vars));
        assert!(eval("enabled", &vars));
        assert!(eval("{enabled} == true", &vars));
    }

    #[test]
    fn unbound_identifier_is_empty_string() {
        let empty = VariableContext::new();

        assert!(!eval("missing", &empty));
        assert!(eval("missing == \"\"", &empty));
        assert!(eval("NOT missing", &empty));
    }

    #[test]
    fn de_morgan_consistency() {
        let vars = ctx(&[("a", "true"), ("b", "false")]);

        let lhs = eval("NOT (a AND b)", &vars);
        let rhs = eval("(NOT a) OR (NOT b)", &vars);

        assert!(lhs);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn precedence_not_binds_tighter_than_and_or() {
        let vars = ctx(&[("a", "true"), ("b", "false"), ("c", "true")]);

        // (NOT b) AND c
        assert!(eval("NOT b AND c", &vars));
        // a OR (b AND false)
        assert!(eval("a OR b AND false", &vars));
        // NOT applies to the comparison
        assert!(eval("NOT 1 == 2", &vars));
        assert!(!eval("(a OR b) AND NOT c", &vars));
    }

    #[test]
    fn zero_literal_is_falsy() {
        let empty = VariableContext::new();

        assert!(!eval("0", &empty));
        assert!(!eval("0.0", &empty));
        assert!(eval("1", &empty));
    }

    #[test]
    fn zero_from_identifier_is_falsy() {
        let vars = ctx(&[("count", "0"), ("other", "7")]);

        assert!(!eval("count", &vars));
        assert!(!eval("{count}", &vars));
        assert!(eval("other", &vars));
        assert!(eval("NOT count", &vars));
    }

    #[test]
    fn keywords_and_booleans_are_case_sensitive() {
        let empty = VariableContext::new();

        // `True` is an unbound identifier.
        assert!(!eval("True", &empty));
        assert!(eval("true", &empty));
        assert!(matches!(
            Expr::parse("a and b"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn evaluation_is_pure() {
        let vars = ctx(&[("a", "1"), ("b", "x")]);
        let expr = Expr::parse("a == 1 AND (b != 'y' OR NOT a)").unwrap();

        let first = expr.evaluate(&vars);
        for _ in 0..10 {
            assert_eq!(expr.evaluate(&vars), first);
        }
        assert_eq!(evaluate("a == 1", &vars), evaluate("a == 1", &vars));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert_eq!(Expr::parse("   "), Err(ExpressionError::Empty));
        assert_eq!(
            Expr::parse("(a AND b"),
            Err(ExpressionError::UnbalancedParens { offset: 0 })
        );
        assert_eq!(
            Expr::parse("a AND b)"),
            Err(ExpressionError::UnbalancedParens { offset: 7 })
        );
        assert_eq!(
            Expr::parse("a AND"),
            Err(ExpressionError::UnexpectedEnd { offset: 5 })
        );
        assert_eq!(
            Expr::parse("a ="),
            Err(ExpressionError::UnknownOperator {
                operator: "=".to_string(),
                offset: 2
            })
        );
        assert!(matches!(
            Expr::parse("a && b"),
            Err(ExpressionError::UnknownOperator { .. })
        ));
        assert!(matches!(
            Expr::parse("a === b"),
            Err(ExpressionError::UnknownOperator { .. })
        ));
        assert!(matches!(
            Expr::parse("a == b == c"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Expr::parse("a b"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            Expr::parse("OR a"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
        assert_eq!(
            Expr::parse("'open"),
            Err(ExpressionError::UnterminatedString { offset: 0 })
        );
        assert_eq!(
            Expr::parse("{a"),
            Err(ExpressionError::InvalidReference { offset: 0 })
        );
    }

    #[test]
    fn strings_may_contain_operators_and_parens() {
        let vars = ctx(&[("label", "a (b) == c")]);

        assert!(eval("label == \"a (b) == c\"", &vars));
    }
}
