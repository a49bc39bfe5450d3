//! Component registry.
//!
//! Scans a components directory laid out as `<name>/<name>.html` with optional
//! `<name>.css` and `<name>.js` siblings and provides lookup by name. Scoped
//! CSS is computed once per component when it is registered, so every page of
//! a build shares the same class suffixes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::css::{scope_css, scope_suffix, ScopedCss};
use crate::directives::extract_directives;

/// A reusable component template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDefinition {
    /// Component name (its directory name)
    pub name: String,

    /// Declared inputs in declaration order
    pub inputs: Vec<String>,

    /// Template body with directives removed
    pub body: String,

    /// Raw stylesheet
    pub css: Option<String>,

    /// Raw script
    pub js: Option<String>,
}

impl ComponentDefinition {
    /// Build a definition from template source, reading its `#INPUT` lines.
    pub fn parse(name: impl Into<String>, source: &str) -> Self {
        let directives = extract_directives(source);
        Self {
            name: name.into(),
            inputs: directives.inputs,
            body: directives.body,
            css: None,
            js: None,
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = Some(js.into());
        self
    }

    /// Load `<dir>/<name>.html` plus optional `.css` and `.js` siblings.
    ///
    /// Returns `Ok(None)` when the directory has no template.
    pub fn load(dir: &Path) -> Result<Option<Self>, RegistryError> {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        let html_path = dir.join(format!("{}.html", name));
        if !html_path.is_file() {
            return Ok(None);
        }

        let mut definition = Self::parse(name, &read(&html_path)?);

        let css_path = dir.join(format!("{}.css", name));
        if css_path.is_file() {
            definition.css = Some(read(&css_path)?);
        }

        let js_path = dir.join(format!("{}.js", name));
        if js_path.is_file() {
            definition.js = Some(read(&js_path)?);
        }

        Ok(Some(definition))
    }
}

fn read(path: &Path) -> Result<String, RegistryError> {
    fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// A registered component with its scoped stylesheet.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredComponent {
    pub definition: ComponentDefinition,

    /// Scoped CSS, present when the component has a stylesheet
    pub style: Option<ScopedCss>,
}

/// A registry of component definitions.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, RegisteredComponent>,

    /// Seed mixed into every scope suffix
    scope_seed: String,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose scope suffixes derive from `seed`.
    pub fn with_seed(seed: impl Into<String>) -> Self {
        Self {
            components: HashMap::new(),
            scope_seed: seed.into(),
        }
    }

    /// Register a component, scoping its CSS. Replaces any previous
    /// definition with the same name.
    pub fn insert(&mut self, definition: ComponentDefinition) {
        let style = definition.css.as_deref().map(|css| {
            let suffix = scope_suffix(&definition.name, &self.scope_seed);
            scope_css(css, &suffix)
        });

        self.components.insert(
            definition.name.clone(),
            RegisteredComponent { definition, style },
        );
    }

    /// Scan a directory for component directories and populate the registry.
    ///
    /// Directories whose files cannot be read are skipped with a warning.
    /// Returns the number of components registered.
    pub fn scan(&mut self, components_dir: &Path) -> Result<usize, RegistryError> {
        if !components_dir.is_dir() {
            return Err(RegistryError::DirectoryNotFound(
                components_dir.display().to_string(),
            ));
        }

        let mut count = 0;

        for entry in WalkDir::new(components_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            match ComponentDefinition::load(path) {
                Ok(Some(definition)) => {
                    tracing::debug!("Registered component {}", definition.name);
                    self.insert(definition);
                    count += 1;
                }
                Ok(None) => {
                    tracing::warn!(
                        "Skipping {}: no component template found",
                        path.display()
                    );
                }
                Err(e) => {
                    tracing::warn!("Skipping component {}: {}", path.display(), e);
                }
            }
        }

        Ok(count)
    }

    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredComponent> {
        self.components.get(name)
    }

    /// Check if a component exists.
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Get all registered component names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<ComponentDefinition> for ComponentRegistry {
    fn from_iter<I: IntoIterator<Item = ComponentDefinition>>(iter: I) -> Self {
        let mut registry = Self::new();
        for definition in iter {
            registry.insert(definition);
        }
        registry
    }
}

/// Errors that can occur with the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Components directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_component(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (ext, content) in files {
            fs::write(dir.join(format!("{}.{}", name, ext)), content).unwrap();
        }
    }

    #[test]
    fn scans_components_directory() {
        let temp = tempdir().unwrap();
        let comp_dir = temp.path().join("components");
        write_component(
            &comp_dir,
            "button",
            &[("html", "#INPUT label\n#INPUT href\n<a class=\"btn\" href=\"{href}\">{label}</a>")],
        );
        write_component(
            &comp_dir,
            "card",
            &[
                ("html", "<div class=\"card\">{children}</div>"),
                ("css", ".card { padding: 1rem; }"),
                ("js", "console.log('card');"),
            ],
        );

        let mut registry = ComponentRegistry::new();
        let count = registry.scan(&comp_dir).unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.names(), vec!["button", "card"]);

        let button = registry.get("button").unwrap();
        assert_eq!(button.definition.inputs, vec!["label", "href"]);
        assert!(button.style.is_none());

        let card = registry.get("card").unwrap();
        assert_eq!(card.definition.js.as_deref(), Some("console.log('card');"));
        let style = card.style.as_ref().unwrap();
        assert!(style.renames["card"].starts_with("card_"));
    }

    #[test]
    fn skips_directories_without_template() {
        let temp = tempdir().unwrap();
        let comp_dir = temp.path().join("components");
        write_component(&comp_dir, "orphan", &[("css", ".x {}")]);
        fs::write(comp_dir.join("notes.txt"), "not a component").unwrap();

        let mut registry = ComponentRegistry::new();
        let count = registry.scan(&comp_dir).unwrap();

        assert_eq!(count, 0);
        assert!(!registry.contains("orphan"));
    }

    #[test]
    fn skips_unreadable_component_and_continues() {
        let temp = tempdir().unwrap();
        let comp_dir = temp.path().join("components");
        fs::create_dir_all(comp_dir.join("a")).unwrap();
        fs::write(comp_dir.join("a/a.html"), [0xff, 0xfe, b'<']).unwrap();
        write_component(&comp_dir, "b", &[("html", "<b>ok</b>")]);

        let mut registry = ComponentRegistry::new();
        let count = registry.scan(&comp_dir).unwrap();

        assert_eq!(count, 1);
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn errors_on_missing_directory() {
        let temp = tempdir().unwrap();

        let result = ComponentRegistry::new().scan(&temp.path().join("missing"));

        assert!(matches!(result, Err(RegistryError::DirectoryNotFound(_))));
    }

    #[test]
    fn scope_seed_changes_suffixes() {
        let card = ComponentDefinition::parse("card", "<div class=\"card\"></div>").with_css(".card {}");

        let mut a = ComponentRegistry::with_seed("one");
        a.insert(card.clone());
        let mut b = ComponentRegistry::with_seed("two");
        b.insert(card);

        let rename = |r: &ComponentRegistry| r.get("card").unwrap().style.as_ref().unwrap().renames["card"].clone();
        assert_ne!(rename(&a), rename(&b));
    }
}
