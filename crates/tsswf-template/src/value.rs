//! Typed values and the variable context conditionals are evaluated against.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Numeric literal: optional sign, digits, optional single decimal point.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("Invalid number regex")
});

/// A value bound to a variable or produced by a literal.
///
/// Numbers keep the text they were written as; string comparisons and
/// substitution use that text, ordering uses the parsed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number { value: f64, text: String },
    Boolean(bool),
}

impl Value {
    /// Type a raw piece of source text (a metadata value or an attribute).
    ///
    /// Numeric text becomes a `Number`, `true`/`false` become a `Boolean`,
    /// everything else stays a `String`.
    pub fn infer(raw: &str) -> Self {
        if let Some(value) = parse_number(raw) {
            return Value::Number {
                value,
                text: raw.to_string(),
            };
        }
        match raw {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Truthiness of a value used directly as a condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Number { value, .. } => *value != 0.0,
            Value::Boolean(b) => *b,
        }
    }

    /// The numeric view of this value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::String(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Number { text, .. } => f.write_str(text),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        let text = if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            value.to_string()
        };
        Value::Number { value, text }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Parse text matching the numeric literal pattern.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    if NUMBER_RE.is_match(text) {
        text.parse().ok()
    } else {
        None
    }
}

/// Variables visible while rendering one page or one component instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableContext {
    vars: HashMap<String, Value>,
}

impl VariableContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any previous binding.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Bind a variable from raw source text, typing it with [`Value::infer`].
    pub fn set_raw(&mut self, name: impl Into<String>, raw: &str) {
        self.vars.insert(name.into(), Value::infer(raw));
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Look up a variable, falling back to the empty string when unbound.
    pub fn resolve(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for VariableContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        for (k, v) in iter {
            ctx.set(k, v);
        }
        ctx
    }
}
