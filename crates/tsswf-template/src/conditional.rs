//! `@IF(expr) { ... } @ELSE { ... }` block rendering.

use std::ops::Range;

use crate::expr::{Expr, ExpressionError};
use crate::value::VariableContext;

const IF_MARKER: &str = "@IF(";
const ELSE_MARKER: &str = "@ELSE";

/// Errors produced by malformed conditional blocks.
///
/// Offsets are byte offsets into the text passed to [`render_conditionals`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionalError {
    #[error("Unclosed @IF condition at offset {offset}")]
    UnclosedCondition { offset: usize },

    #[error("Expected `{{` after @IF condition at offset {offset}")]
    MissingBody { offset: usize },

    #[error("Unclosed @IF body at offset {offset}")]
    UnclosedBody { offset: usize },

    #[error("Expected `{{` after @ELSE at offset {offset}")]
    MissingElseBody { offset: usize },

    #[error("Unclosed @ELSE body at offset {offset}")]
    UnclosedElseBody { offset: usize },

    #[error("Invalid @IF condition at offset {offset}: {source}")]
    Expression {
        offset: usize,
        #[source]
        source: ExpressionError,
    },
}

impl ConditionalError {
    /// Byte offset of the offending block.
    pub fn offset(&self) -> usize {
        match self {
            ConditionalError::UnclosedCondition { offset }
            | ConditionalError::MissingBody { offset }
            | ConditionalError::UnclosedBody { offset }
            | ConditionalError::MissingElseBody { offset }
            | ConditionalError::UnclosedElseBody { offset }
            | ConditionalError::Expression { offset, .. } => *offset,
        }
    }

    fn shifted(mut self, base: usize) -> Self {
        match &mut self {
            ConditionalError::UnclosedCondition { offset }
            | ConditionalError::MissingBody { offset }
            | ConditionalError::UnclosedBody { offset }
            | ConditionalError::MissingElseBody { offset }
            | ConditionalError::UnclosedElseBody { offset }
            | ConditionalError::Expression { offset, .. } => *offset += base,
        }
        self
    }
}

/// A located `@IF` block.
#[derive(Debug, Clone, PartialEq)]
struct Block {
    condition: Range<usize>,
    then_body: Range<usize>,
    else_body: Option<Range<usize>>,
    end: usize,
}

/// Replace every conditional block in `text` with its selected branch.
///
/// Selected branches are rendered recursively, so nested blocks resolve too.
/// Text without any `@IF(` is returned unchanged.
pub fn render_conditionals(text: &str, ctx: &VariableContext) -> Result<String, ConditionalError> {
    render_at(text, ctx, 0)
}

fn render_at(text: &str, ctx: &VariableContext, base: usize) -> Result<String, ConditionalError> {
    if !text.contains(IF_MARKER) {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(found) = text[pos..].find(IF_MARKER) {
        let start = pos + found;
        out.push_str(&text[pos..start]);

        let block = parse_block(text, start).map_err(|e| e.shifted(base))?;

        let expr = Expr::parse(&text[block.condition.clone()]).map_err(|source| {
            ConditionalError::Expression {
                offset: base + start,
                source,
            }
        })?;

        let chosen = if expr.evaluate(ctx) {
            Some(block.then_body)
        } else {
            block.else_body
        };

        if let Some(range) = chosen {
            let rendered = render_at(&text[range.clone()], ctx, base + range.start)?;
            out.push_str(&rendered);
        }

        pos = block.end;
    }

    out.push_str(&text[pos..]);
    Ok(out)
}

fn parse_block(text: &str, start: usize) -> Result<Block, ConditionalError> {
    let cond_start = start + IF_MARKER.len();
    let cond_end = find_closing_paren(text, cond_start)
        .ok_or(ConditionalError::UnclosedCondition { offset: start })?;

    let open = skip_whitespace(text, cond_end + 1);
    if !text[open..].starts_with('{') {
        return Err(ConditionalError::MissingBody { offset: start });
    }
    let close = find_matching_brace(text, open).ok_or(ConditionalError::UnclosedBody { offset: start })?;

    let mut block = Block {
        condition: cond_start..cond_end,
        then_body: open + 1..close,
        else_body: None,
        end: close + 1,
    };

    let else_start = skip_whitespace(text, close + 1);
    if starts_with_else(&text[else_start..]) {
        let else_open = skip_whitespace(text, else_start + ELSE_MARKER.len());
        if !text[else_open..].starts_with('{') {
            return Err(ConditionalError::MissingElseBody { offset: else_start });
        }
        let else_close = find_matching_brace(text, else_open)
            .ok_or(ConditionalError::UnclosedElseBody { offset: else_start })?;

        block.else_body = Some(else_open + 1..else_close);
        block.end = else_close + 1;
    }

    Ok(block)
}

/// `@ELSE` as a whole word, so `@ELSEWHERE` is left as text.
fn starts_with_else(rest: &str) -> bool {
    rest.strip_prefix(ELSE_MARKER)
        .is_some_and(|after| !after.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .find(|c: char| !c.is_whitespace())
        .map(|i| from + i)
        .unwrap_or(text.len())
}

/// Find the `)` closing a condition that starts at `from`, skipping quoted strings.
fn find_closing_paren(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1;
    let mut quote: Option<char> = None;

    for (i, c) in text[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Find the `}` matching the `{` at `open`.
///
/// Conditions of nested `@IF(...)` blocks are skipped whole, so braces in
/// their quoted strings do not count.
fn find_matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0;
    let mut i = open;

    while i < bytes.len() {
        if bytes[i..].starts_with(IF_MARKER.as_bytes()) {
            i = find_closing_paren(text, i + IF_MARKER.len())? + 1;
            continue;
        }
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}
