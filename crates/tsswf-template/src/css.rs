//! Component CSS scoping.
//!
//! Every class selector in a component's stylesheet gets a per-component
//! suffix (`.card` becomes `.card_1a2b3c4d`), and the same renames are applied
//! to `class` attributes in the component's markup.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\sclass\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`/]+))"#)
        .expect("Invalid class attribute regex")
});

static CLASS_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+").expect("Invalid class token regex"));

/// At-rules whose blocks contain further rules rather than declarations.
const NESTING_AT_RULES: &[&str] = &["media", "supports", "container", "layer", "document", "scope"];

/// A stylesheet with its class selectors renamed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedCss {
    /// Rewritten stylesheet
    pub css: String,

    /// Original class name -> scoped class name
    pub renames: BTreeMap<String, String>,
}

/// Derive the scope suffix for a component.
///
/// The suffix depends only on the seed and the component name, so every use
/// of a component in a build shares it.
pub fn scope_suffix(component: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update([0u8]);
    hasher.update(component.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Rules,
    Declarations,
}

/// Append `_suffix` to every class selector in `css`.
pub fn scope_css(css: &str, suffix: &str) -> ScopedCss {
    let bytes = css.as_bytes();
    let len = bytes.len();

    let mut out = String::with_capacity(css.len() + 16);
    let mut renames = BTreeMap::new();
    let mut copied = 0;
    let mut stack: Vec<BlockKind> = Vec::new();
    let mut prelude_start = 0;
    let mut i = 0;

    while i < len {
        let in_declarations = stack.last() == Some(&BlockKind::Declarations);

        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map(|p| i + 2 + p + 2).unwrap_or(len);
                continue;
            }
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'{' => {
                let kind = if in_declarations {
                    BlockKind::Declarations
                } else {
                    block_kind(strip_comments(&css[prelude_start..i]).trim())
                };
                stack.push(kind);
                prelude_start = i + 1;
            }
            b'}' => {
                stack.pop();
                prelude_start = i + 1;
            }
            b';' => prelude_start = i + 1,
            b'u' | b'U' if !in_declarations && starts_with_ignore_case(&bytes[i..], b"url(") => {
                i = css[i..].find(')').map(|p| i + p + 1).unwrap_or(len);
                continue;
            }
            b'.' if !in_declarations => {
                let after_digit = i > 0 && bytes[i - 1].is_ascii_digit();
                let start = i + 1;
                let end = class_name_end(bytes, start);

                if !after_digit && starts_identifier(&bytes[start..end]) {
                    let name = unescape(&css[start..end]);
                    let scoped = format!("{}_{}", name, suffix);
                    renames.entry(name).or_insert(scoped);

                    out.push_str(&css[copied..end]);
                    out.push('_');
                    out.push_str(suffix);
                    copied = end;
                    i = end;
                    continue;
                }
            }
            _ => {}
        }

        i += 1;
    }

    out.push_str(&css[copied..]);

    ScopedCss { css: out, renames }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

fn block_kind(prelude: &str) -> BlockKind {
    let Some(at_rule) = prelude.strip_prefix('@') else {
        return BlockKind::Declarations;
    };
    let name: String = at_rule
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();

    if NESTING_AT_RULES.contains(&name.as_str()) {
        BlockKind::Rules
    } else {
        BlockKind::Declarations
    }
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Skip a quoted string starting at `start`, returning the index after it.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b >= 0x80
}

fn class_name_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1].is_ascii() {
            i += 2;
        } else if is_name_byte(bytes[i]) {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn starts_identifier(name: &[u8]) -> bool {
    let is_start = |b: u8| b.is_ascii_alphabetic() || b == b'_' || b == b'\\' || b >= 0x80;
    match name {
        [first, ..] if is_start(*first) => true,
        [b'-', second, ..] => is_start(*second) || *second == b'-',
        _ => false,
    }
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Rewrite `class` attribute tokens found in `renames`.
///
/// Tokens that are not in the map are left alone.
pub fn rewrite_class_attributes(html: &str, renames: &BTreeMap<String, String>) -> String {
    if renames.is_empty() {
        return html.to_string();
    }

    CLASS_ATTR_RE
        .replace_all(html, |caps: &Captures| {
            let (quote, value) = match (caps.get(2), caps.get(3), caps.get(4)) {
                (Some(v), _, _) => ("\"", v.as_str()),
                (None, Some(v), _) => ("'", v.as_str()),
                (None, None, Some(v)) => ("", v.as_str()),
                (None, None, None) => ("\"", ""),
            };

            let rewritten = CLASS_TOKEN_RE.replace_all(value, |token: &Captures| {
                renames
                    .get(&token[0])
                    .cloned()
                    .unwrap_or_else(|| token[0].to_string())
            });

            format!("{}{}{}{}", &caps[1], quote, rewritten, quote)
        })
        .into_owned()
}
