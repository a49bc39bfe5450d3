//! Component tag scanner.
//!
//! Finds `<c-name attr="v" />` and `<c-name ...>children</c-name>` uses in
//! markup. Closing tags are matched by depth so children may contain further
//! uses of the same component.

use std::ops::Range;

const TAG_PREFIX: &str = "<c-";

/// One use of a component in markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTag<'a> {
    /// Component name (without the `c-` prefix)
    pub name: &'a str,

    /// Attributes in source order
    pub attributes: Vec<(String, String)>,

    /// Inner markup for the container form, `None` when self-closing
    pub children: Option<&'a str>,

    /// Byte range of the whole use, open tag through closing tag
    pub span: Range<usize>,
}

impl ComponentTag<'_> {
    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors produced by malformed component tags.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TagError {
    #[error("Unterminated <c-{name}> tag at offset {offset}")]
    UnterminatedTag { name: String, offset: usize },

    #[error("Missing </c-{name}> for tag at offset {offset}")]
    MissingClose { name: String, offset: usize },
}

struct OpenTag {
    attributes: Vec<(String, String)>,
    self_closing: bool,
    end: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Find the first component tag at or after `from`.
pub fn find_component_tag(text: &str, from: usize) -> Result<Option<ComponentTag<'_>>, TagError> {
    let mut search = from;

    while let Some(found) = text[search..].find(TAG_PREFIX) {
        let start = search + found;
        let name_start = start + TAG_PREFIX.len();
        let name_end = text[name_start..]
            .find(|c: char| !is_name_char(c))
            .map(|i| name_start + i)
            .unwrap_or(text.len());

        if name_end == name_start {
            search = name_start;
            continue;
        }

        let name = &text[name_start..name_end];
        let open = parse_open_tag(text, name_end).ok_or_else(|| TagError::UnterminatedTag {
            name: name.to_string(),
            offset: start,
        })?;

        if open.self_closing {
            return Ok(Some(ComponentTag {
                name,
                attributes: open.attributes,
                children: None,
                span: start..open.end,
            }));
        }

        let (close_start, close_end) =
            find_matching_close(text, name, open.end).ok_or_else(|| TagError::MissingClose {
                name: name.to_string(),
                offset: start,
            })?;

        return Ok(Some(ComponentTag {
            name,
            attributes: open.attributes,
            children: Some(&text[open.end..close_start]),
            span: start..close_end,
        }));
    }

    Ok(None)
}

/// Parse attributes after the tag name up to `>` or `/>`.
fn parse_open_tag(text: &str, from: usize) -> Option<OpenTag> {
    let mut attributes = Vec::new();
    let mut pos = from;

    loop {
        pos += text[pos..].len() - text[pos..].trim_start().len();
        let rest = &text[pos..];

        if rest.is_empty() {
            return None;
        }
        if rest.starts_with("/>") {
            return Some(OpenTag {
                attributes,
                self_closing: true,
                end: pos + 2,
            });
        }
        if rest.starts_with('>') {
            return Some(OpenTag {
                attributes,
                self_closing: false,
                end: pos + 1,
            });
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\''))
            .unwrap_or(rest.len());
        if name_len == 0 {
            // Stray quote or slash.
            pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            continue;
        }
        let attr_name = rest[..name_len].to_string();
        pos += name_len;

        let after_name = text[pos..].trim_start();
        if !after_name.starts_with('=') {
            // Bare attribute: presence means true.
            attributes.push((attr_name, "true".to_string()));
            continue;
        }
        pos = text.len() - after_name.len() + 1;
        pos += text[pos..].len() - text[pos..].trim_start().len();

        let rest = &text[pos..];
        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let close = rest[1..].find(quote)?;
                pos += close + 2;
                rest[1..close + 1].to_string()
            }
            Some(_) => {
                let len = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                let len = if rest[..len].ends_with('/') && rest[len..].starts_with('>') {
                    len - 1
                } else {
                    len
                };
                pos += len;
                rest[..len].to_string()
            }
            None => return None,
        };

        attributes.push((attr_name, value));
    }
}

/// Find `</c-name>` matching an open tag that ends at `from`.
///
/// Returns the start and end byte offsets of the closing tag.
fn find_matching_close(text: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let open_pattern = format!("{}{}", TAG_PREFIX, name);
    let close_tag = format!("</c-{}>", name);

    let mut depth = 1;
    let mut pos = from;

    loop {
        let next_open = text[pos..].find(&open_pattern).map(|i| pos + i);
        let next_close = text[pos..].find(&close_tag).map(|i| pos + i)?;

        match next_open {
            Some(open) if open < next_close => {
                let after = open + open_pattern.len();
                // `<c-card-body` is a different component than `<c-card`.
                if text[after..].starts_with(is_name_char) {
                    pos = after;
                    continue;
                }
                let tag = parse_open_tag(text, after)?;
                if !tag.self_closing {
                    depth += 1;
                }
                pos = tag.end;
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Some((next_close, next_close + close_tag.len()));
                }
                pos = next_close + close_tag.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_self_closing_tag() {
        let text = r#"<p>x</p><c-button label="Go" href='/x'/>"#;

        let tag = find_component_tag(text, 0).unwrap().unwrap();

        assert_eq!(tag.name, "button");
        assert_eq!(tag.attribute("label"), Some("Go"));
        assert_eq!(tag.attribute("href"), Some("/x"));
        assert_eq!(tag.children, None);
        assert_eq!(&text[tag.span], r#"<c-button label="Go" href='/x'/>"#);
    }

    #[test]
    fn finds_container_tag_with_children() {
        let text = "<c-card title=\"A\">\n  <b>inner</b>\n</c-card> tail";

        let tag = find_component_tag(text, 0).unwrap().unwrap();

        assert_eq!(tag.name, "card");
        assert_eq!(tag.children, Some("\n  <b>inner</b>\n"));
        assert_eq!(&text[tag.span.end..], " tail");
    }

    #[test]
    fn matches_nested_same_name_tags() {
        let text = "<c-box><c-box/><c-box a=1>in</c-box></c-box>!";

        let tag = find_component_tag(text, 0).unwrap().unwrap();

        assert_eq!(tag.children, Some("<c-box/><c-box a=1>in</c-box>"));
        assert_eq!(tag.span.end, text.len() - 1);
    }

    #[test]
    fn distinguishes_prefixed_names() {
        let text = "<c-card><c-card-body>x</c-card-body></c-card>";

        let tag = find_component_tag(text, 0).unwrap().unwrap();

        assert_eq!(tag.name, "card");
        assert_eq!(tag.children, Some("<c-card-body>x</c-card-body>"));
    }

    #[test]
    fn parses_attribute_forms() {
        let text = r#"<c-x a="1 > 2" b='q' c=plain d e=v/>"#;

        let tag = find_component_tag(text, 0).unwrap().unwrap();

        assert_eq!(
            tag.attributes,
            vec![
                ("a".to_string(), "1 > 2".to_string()),
                ("b".to_string(), "q".to_string()),
                ("c".to_string(), "plain".to_string()),
                ("d".to_string(), "true".to_string()),
                ("e".to_string(), "v".to_string()),
            ]
        );
        assert_eq!(tag.span.end, text.len());
    }

    #[test]
    fn ignores_plain_markup() {
        assert_eq!(find_component_tag("<div class=\"c-x\">a <c- b</div>", 0).unwrap(), None);
    }

    #[test]
    fn reports_malformed_tags() {
        assert_eq!(
            find_component_tag("ab<c-card title=\"x\"", 0),
            Err(TagError::UnterminatedTag {
                name: "card".to_string(),
                offset: 2
            })
        );
        assert_eq!(
            find_component_tag("<c-card>never closed", 0),
            Err(TagError::MissingClose {
                name: "card".to_string(),
                offset: 0
            })
        );
    }
}
