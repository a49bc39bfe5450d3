//! Template engine for tsswf.
//!
//! Renders pages written in HTML with leading directives, `@IF` blocks and
//! `<c-name>` component tags into complete documents, collecting the scoped
//! styles and scripts of the components each page uses.

pub mod component;
pub mod conditional;
pub mod css;
pub mod directives;
pub mod expr;
pub mod page;
pub mod registry;
pub mod tag;
pub mod value;

pub use component::{expand, render_template, AssetFragment, ExpandError, Expansion, PageAssets};
pub use conditional::{render_conditionals, ConditionalError};
pub use css::{rewrite_class_attributes, scope_css, scope_suffix, ScopedCss};
pub use directives::{extract_directives, Directives, MetaKey};
pub use expr::{evaluate, Expr, ExpressionError};
pub use page::{render_page, PageSource, Placeholder, RenderError, RenderedPage};
pub use registry::{ComponentDefinition, ComponentRegistry, RegisteredComponent, RegistryError};
pub use tag::{find_component_tag, ComponentTag, TagError};
pub use value::{Value, VariableContext};
