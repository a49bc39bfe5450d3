//! Page rendering: page body, skeleton placeholders, and the final pass.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::component::{render_template, ExpandError, PageAssets};
use crate::directives::{extract_directives, Directives, MetaKey};
use crate::registry::ComponentRegistry;
use crate::value::VariableContext;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(PAGE_HEAD_TITLE|PAGE_TITLE|PAGE_ID|PAGE_CONTENT|CSS_HASH)\b")
        .expect("Invalid skeleton placeholder regex")
});

/// Skeleton placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    PageHeadTitle,
    PageTitle,
    PageId,
    PageContent,
    CssHash,
}

impl Placeholder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PAGE_HEAD_TITLE" => Some(Placeholder::PageHeadTitle),
            "PAGE_TITLE" => Some(Placeholder::PageTitle),
            "PAGE_ID" => Some(Placeholder::PageId),
            "PAGE_CONTENT" => Some(Placeholder::PageContent),
            "CSS_HASH" => Some(Placeholder::CssHash),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::PageHeadTitle => "PAGE_HEAD_TITLE",
            Placeholder::PageTitle => "PAGE_TITLE",
            Placeholder::PageId => "PAGE_ID",
            Placeholder::PageContent => "PAGE_CONTENT",
            Placeholder::CssHash => "CSS_HASH",
        }
    }
}

/// Inputs for rendering one page.
#[derive(Debug, Clone, Copy)]
pub struct PageSource<'a> {
    /// Page template, directives included
    pub text: &'a str,

    /// Skeleton template shared by all pages
    pub skeleton: &'a str,

    /// Page identifier, usually the file stem
    pub page_id: &'a str,

    /// Cache-busting hash for global assets
    pub css_hash: &'a str,
}

/// A rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// Final document
    pub html: String,

    /// Resolved head title
    pub title: String,

    /// Component styles and scripts used by the page
    pub assets: PageAssets,
}

/// Errors that can occur while rendering a page.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Page body: {0}")]
    Page(#[source] ExpandError),

    #[error("Skeleton: {0}")]
    Skeleton(#[source] ExpandError),
}

impl RenderError {
    /// The underlying expansion error.
    pub fn expand_error(&self) -> &ExpandError {
        match self {
            RenderError::Page(e) | RenderError::Skeleton(e) => e,
        }
    }
}

/// Resolved values for the well-known page variables.
struct PageValues<'a> {
    title: String,
    head_title: String,
    page_id: &'a str,
    css_hash: &'a str,
}

impl PageValues<'_> {
    fn bind(&self, ctx: &mut VariableContext) {
        ctx.set(Placeholder::PageTitle.name(), self.title.as_str());
        ctx.set(Placeholder::PageHeadTitle.name(), self.head_title.as_str());
        ctx.set(Placeholder::PageId.name(), self.page_id);
        ctx.set(Placeholder::CssHash.name(), self.css_hash);
    }
}

fn bind_metadata(ctx: &mut VariableContext, directives: &Directives) {
    for (key, value) in &directives.metadata {
        ctx.set_raw(key.as_str(), value);
    }
}

/// Render a page into the skeleton.
pub fn render_page(
    page: &PageSource<'_>,
    registry: &ComponentRegistry,
) -> Result<RenderedPage, RenderError> {
    let directives = extract_directives(page.text);

    let title = directives.get(MetaKey::PageTitle).unwrap_or_default().to_string();
    let head_title = directives
        .get(MetaKey::PageHeadTitle)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| title.clone());
    let values = PageValues {
        title,
        head_title,
        page_id: page.page_id,
        css_hash: page.css_hash,
    };

    let mut page_ctx = VariableContext::new();
    bind_metadata(&mut page_ctx, &directives);
    values.bind(&mut page_ctx);

    let body = render_template(&directives.body, &page_ctx, registry).map_err(RenderError::Page)?;

    let skeleton = extract_directives(page.skeleton);
    let filled = fill_placeholders(&skeleton.body, &values, &body.html);

    // Skeleton directives are defaults that page metadata overrides.
    let mut skeleton_ctx = VariableContext::new();
    bind_metadata(&mut skeleton_ctx, &skeleton);
    bind_metadata(&mut skeleton_ctx, &directives);
    values.bind(&mut skeleton_ctx);

    let document = render_template(&filled, &skeleton_ctx, registry).map_err(RenderError::Skeleton)?;

    let mut assets = body.assets;
    assets.merge(document.assets);

    Ok(RenderedPage {
        html: document.html,
        title: values.head_title,
        assets,
    })
}

/// Substitute skeleton placeholders in one pass; inserted text is not rescanned.
fn fill_placeholders(skeleton: &str, values: &PageValues<'_>, content: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(skeleton, |caps: &Captures| {
            match Placeholder::from_name(&caps[1]) {
                Some(Placeholder::PageHeadTitle) => values.head_title.clone(),
                Some(Placeholder::PageTitle) => values.title.clone(),
                Some(Placeholder::PageId) => values.page_id.to_string(),
                Some(Placeholder::PageContent) => content.to_string(),
                Some(Placeholder::CssHash) => values.css_hash.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
