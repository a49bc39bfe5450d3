//! Leading directive extraction.
//!
//! Pages, the skeleton and component templates may start with directive lines:
//!
//! ```text
//! #PAGE_TITLE:Home
//! #INPUT label
//! ```
//!
//! `#KEY:value` lines become metadata, `#INPUT name` lines declare component
//! inputs. Scanning stops at the first line that is neither a directive nor
//! blank.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

static META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([A-Za-z_][A-Za-z0-9_]*):(.*)$").expect("Invalid metadata directive regex")
});

static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#INPUT\s+([A-Za-z_][A-Za-z0-9_-]*)\s*$").expect("Invalid input directive regex")
});

/// Metadata keys with a fixed meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    /// Page title, substituted for `#PAGE_TITLE`.
    PageTitle,
    /// Title for `<title>`, substituted for `#PAGE_HEAD_TITLE`.
    PageHeadTitle,
}

impl MetaKey {
    pub const ALL: [MetaKey; 2] = [MetaKey::PageTitle, MetaKey::PageHeadTitle];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::PageTitle => "PAGE_TITLE",
            MetaKey::PageHeadTitle => "PAGE_HEAD_TITLE",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

/// Directives extracted from the top of a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    /// All `#KEY:value` pairs, well-known or not
    pub metadata: BTreeMap<String, String>,

    /// Declared inputs in declaration order
    pub inputs: Vec<String>,

    /// Template text after the directive lines
    pub body: String,
}

impl Directives {
    /// Look up a well-known metadata key.
    pub fn get(&self, key: MetaKey) -> Option<&str> {
        self.metadata.get(key.as_str()).map(String::as_str)
    }

    /// Metadata entries that are not well-known keys.
    pub fn extra(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .filter(|(k, _)| MetaKey::from_key(k).is_none())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Split leading directives from a template.
pub fn extract_directives(source: &str) -> Directives {
    let mut directives = Directives::default();
    let mut rest = source;

    while !rest.is_empty() {
        let (line, next) = match rest.find('\n') {
            Some(pos) => (&rest[..pos], &rest[pos + 1..]),
            None => (rest, ""),
        };
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            rest = next;
            continue;
        }

        if let Some(caps) = INPUT_RE.captures(line) {
            let name = caps[1].to_string();
            if !directives.inputs.contains(&name) {
                directives.inputs.push(name);
            }
        } else if let Some(caps) = META_RE.captures(line) {
            directives
                .metadata
                .insert(caps[1].to_string(), caps[2].trim().to_string());
        } else {
            break;
        }

        rest = next;
    }

    directives.body = rest.to_string();
    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_metadata_and_body() {
        let source = "#PAGE_TITLE: Home \n#PAGE_HEAD_TITLE:Welcome\n<h1>Hi</h1>\n";

        let d = extract_directives(source);

        assert_eq!(d.get(MetaKey::PageTitle), Some("Home"));
        assert_eq!(d.get(MetaKey::PageHeadTitle), Some("Welcome"));
        assert_eq!(d.body, "<h1>Hi</h1>\n");
    }

    #[test]
    fn extracts_inputs_in_order() {
        let source = "#INPUT label\n#INPUT href\n#INPUT label\n\n<a href=\"{href}\">{label}</a>";

        let d = extract_directives(source);

        assert_eq!(d.inputs, vec!["label".to_string(), "href".to_string()]);
        assert_eq!(d.body, "<a href=\"{href}\">{label}</a>");
    }

    #[test]
    fn unknown_keys_pass_through() {
        let d = extract_directives("#SHOW_NAV:false\n#PAGE_TITLE:x\nbody");

        assert_eq!(d.metadata.get("SHOW_NAV").map(String::as_str), Some("false"));
        assert_eq!(d.extra().collect::<Vec<_>>(), vec![("SHOW_NAV", "false")]);
    }

    #[test]
    fn stops_at_first_body_line() {
        let d = extract_directives("#PAGE_TITLE:A\n<p>text</p>\n#PAGE_ID:not-a-directive\n");

        assert_eq!(d.metadata.len(), 1);
        assert_eq!(d.body, "<p>text</p>\n#PAGE_ID:not-a-directive\n");
    }

    #[test]
    fn placeholder_lines_are_body() {
        let d = extract_directives("#PAGE_CONTENT\n");

        assert!(d.metadata.is_empty());
        assert_eq!(d.body, "#PAGE_CONTENT\n");
    }

    #[test]
    fn handles_crlf_and_no_directives() {
        let d = extract_directives("#INPUT a\r\n<b>{a}</b>\r\n");
        assert_eq!(d.inputs, vec!["a".to_string()]);
        assert_eq!(d.body, "<b>{a}</b>\r\n");

        let plain = extract_directives("<p>plain</p>");
        assert_eq!(plain, Directives {
            body: "<p>plain</p>".to_string(),
            ..Default::default()
        });
    }
}
