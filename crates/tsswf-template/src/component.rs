//! Recursive component expansion.
//!
//! Each `<c-name>` use is replaced by the component's body with its inputs
//! bound, its conditionals rendered, its classes scoped and `{children}`
//! filled in. Components used inside a body are expanded in turn; a component
//! that (directly or transitively) uses itself is an error.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::conditional::{render_conditionals, ConditionalError};
use crate::css::rewrite_class_attributes;
use crate::registry::ComponentRegistry;
use crate::tag::{find_component_tag, ComponentTag, TagError};
use crate::value::VariableContext;

/// Name bound to a container's inner markup.
pub const CHILDREN: &str = "children";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}").expect("Invalid placeholder regex")
});

/// CSS or JS emitted on behalf of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFragment {
    pub component: String,
    pub content: String,
}

/// Component styles and scripts collected while rendering a page, in first-use
/// order and at most once per component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAssets {
    pub styles: Vec<AssetFragment>,
    pub scripts: Vec<AssetFragment>,
}

impl PageAssets {
    fn push_unique(list: &mut Vec<AssetFragment>, component: &str, content: &str) {
        if list.iter().any(|f| f.component == component) {
            return;
        }
        list.push(AssetFragment {
            component: component.to_string(),
            content: content.to_string(),
        });
    }

    pub fn add_style(&mut self, component: &str, css: &str) {
        Self::push_unique(&mut self.styles, component, css);
    }

    pub fn add_script(&mut self, component: &str, js: &str) {
        Self::push_unique(&mut self.scripts, component, js);
    }

    /// Append fragments from `other` that are not already present.
    pub fn merge(&mut self, other: PageAssets) {
        for f in other.styles {
            self.add_style(&f.component, &f.content);
        }
        for f in other.scripts {
            self.add_script(&f.component, &f.content);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty() && self.scripts.is_empty()
    }
}

/// Result of expanding a block of markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub html: String,
    pub assets: PageAssets,
}

/// Errors that can occur during expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("Unknown component `{name}` at offset {offset}")]
    UnknownComponent { name: String, offset: usize },

    #[error("Cyclic component inclusion: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Conditional(#[from] ConditionalError),

    #[error("In component `{component}`: {source}")]
    InComponent {
        component: String,
        #[source]
        source: Box<ExpandError>,
    },
}

impl ExpandError {
    /// The innermost error, without component context.
    pub fn root(&self) -> &ExpandError {
        match self {
            ExpandError::InComponent { source, .. } => source.root(),
            other => other,
        }
    }

    fn in_component(component: &str, error: ExpandError) -> Self {
        match error {
            // The path already names every component involved.
            cycle @ ExpandError::Cycle { .. } => cycle,
            other => ExpandError::InComponent {
                component: component.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Render conditionals in `text`, then expand its components.
pub fn render_template(
    text: &str,
    ctx: &VariableContext,
    registry: &ComponentRegistry,
) -> Result<Expansion, ExpandError> {
    let text = render_conditionals(text, ctx)?;
    expand(&text, ctx, registry)
}

/// Expand every component use in `text`.
///
/// `ctx` is the context of the surrounding template; it applies to the
/// children of components used directly in `text`.
pub fn expand(
    text: &str,
    ctx: &VariableContext,
    registry: &ComponentRegistry,
) -> Result<Expansion, ExpandError> {
    let mut assets = PageAssets::default();
    let html = Expander { registry }.expand_in(text, ctx, &[], &mut assets)?;
    Ok(Expansion { html, assets })
}

struct Expander<'r> {
    registry: &'r ComponentRegistry,
}

impl Expander<'_> {
    fn expand_in(
        &self,
        text: &str,
        ctx: &VariableContext,
        path: &[String],
        assets: &mut PageAssets,
    ) -> Result<String, ExpandError> {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;

        while let Some(tag) = find_component_tag(text, pos)? {
            out.push_str(&text[pos..tag.span.start]);
            out.push_str(&self.instantiate(&tag, ctx, path, assets)?);
            pos = tag.span.end;
        }

        out.push_str(&text[pos..]);
        Ok(out)
    }

    fn instantiate(
        &self,
        tag: &ComponentTag<'_>,
        parent_ctx: &VariableContext,
        path: &[String],
        assets: &mut PageAssets,
    ) -> Result<String, ExpandError> {
        let name = tag.name;
        let component = self
            .registry
            .get(name)
            .ok_or_else(|| ExpandError::UnknownComponent {
                name: name.to_string(),
                offset: tag.span.start,
            })?;

        if path.iter().any(|p| p == name) {
            let mut cycle = path.to_vec();
            cycle.push(name.to_string());
            return Err(ExpandError::Cycle { path: cycle });
        }

        let definition = &component.definition;
        if let Some(style) = &component.style {
            assets.add_style(name, &style.css);
        }
        if let Some(js) = &definition.js {
            assets.add_script(name, js);
        }

        // Children belong to the caller: expand them in its context and path.
        let children = match tag.children {
            Some(inner) => self.expand_in(inner, parent_ctx, path, assets)?,
            None => String::new(),
        };

        let mut bindings: HashMap<&str, &str> = HashMap::new();
        for (attr, value) in &tag.attributes {
            if definition.inputs.iter().any(|i| i == attr) {
                bindings.insert(attr.as_str(), value.as_str());
            } else {
                tracing::debug!("Ignoring undeclared attribute `{}` on <c-{}>", attr, name);
            }
        }

        let mut ctx = VariableContext::new();
        for input in &definition.inputs {
            ctx.set_raw(input.as_str(), bindings.get(input.as_str()).copied().unwrap_or(""));
        }
        ctx.set(CHILDREN, children.as_str());

        let wrap = |e: ExpandError| ExpandError::in_component(name, e);

        let body = render_conditionals(&definition.body, &ctx).map_err(|e| wrap(e.into()))?;
        let body = substitute(&body, &bindings);
        let body = match &component.style {
            Some(style) => rewrite_class_attributes(&body, &style.renames),
            None => body,
        };
        let body = body.replace("{children}", &children);

        let mut inner_path = path.to_vec();
        inner_path.push(name.to_string());

        self.expand_in(&body, &ctx, &inner_path, assets).map_err(wrap)
    }
}

/// Replace `{name}` placeholders other than `{children}` with bound values.
fn substitute(body: &str, bindings: &HashMap<&str, &str>) -> String {
    PLACEHOLDER_RE
        .replace_all(body, |caps: &Captures| {
            let name = &caps[1];
            if name == CHILDREN {
                return caps[0].to_string();
            }
            bindings.get(name).copied().unwrap_or("").to_string()
        })
        .into_owned()
}
