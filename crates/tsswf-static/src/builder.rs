//! Static site builder.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use tsswf_template::{render_page, ComponentRegistry, PageSource, RenderError};

use crate::assets::{AssetError, AssetPipeline};

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root containing `src/`
    pub project_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Minify component and global CSS
    pub minify: bool,

    /// Seed mixed into component scope suffixes
    pub scope_seed: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            output_dir: PathBuf::from("dist"),
            minify: false,
            scope_seed: String::new(),
        }
    }
}

impl BuildConfig {
    pub fn src_dir(&self) -> PathBuf {
        self.project_dir.join("src")
    }

    pub fn skeleton_path(&self) -> PathBuf {
        self.src_dir().join("skeleton.html")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.src_dir().join("pages")
    }

    pub fn components_dir(&self) -> PathBuf {
        self.src_dir().join("components")
    }
}

/// A page that could not be built.
#[derive(Debug, Clone)]
pub struct PageFailure {
    /// Source path relative to the pages directory
    pub path: PathBuf,

    /// Rendered error message
    pub message: String,
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages generated
    pub pages: usize,

    /// Number of registered components
    pub components: usize,

    /// Pages that failed to render or write
    pub failed: Vec<PageFailure>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Skeleton not found: {0}")]
    SkeletonNotFound(PathBuf),

    #[error("Pages directory not found: {0}")]
    PagesNotFound(PathBuf),

    #[error("Failed to read {0}")]
    ReadError(String),

    #[error("Failed to render {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Relative path from the pages dir
    relative_path: PathBuf,

    /// Output path
    output_path: PathBuf,

    /// Page identifier handed to the template
    page_id: String,

    /// Page source
    text: String,
}

/// Static site builder.
pub struct StaticBuilder {
    config: BuildConfig,
    registry: Arc<ComponentRegistry>,
}

impl StaticBuilder {
    /// Create a new static builder, loading components from the project.
    pub fn new(config: BuildConfig) -> Self {
        let mut registry = ComponentRegistry::with_seed(config.scope_seed.clone());

        let components_dir = config.components_dir();
        if components_dir.exists() {
            match registry.scan(&components_dir) {
                Ok(count) => {
                    tracing::info!(
                        "Loaded {} components from {}",
                        count,
                        components_dir.display()
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to scan components directory: {}", e);
                }
            }
        }

        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    /// Build the static site.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let skeleton_path = self.config.skeleton_path();
        if !skeleton_path.is_file() {
            return Err(BuildError::SkeletonNotFound(skeleton_path));
        }
        let skeleton = fs::read_to_string(&skeleton_path)
            .map_err(|e| BuildError::ReadError(format!("{}: {}", skeleton_path.display(), e)))?;

        let pages = self.discover_pages()?;

        fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| BuildError::WriteError(e.to_string()))?;

        let src_dir = self.config.src_dir();
        let css_hash = AssetPipeline::cache_hash(&AssetPipeline::global_assets(&src_dir))?;
        let copied = AssetPipeline::copy_static(&src_dir, &self.config.output_dir, self.config.minify)?;
        tracing::info!("Copied {} asset files", copied);

        // Render and write pages in parallel
        let results: Vec<(&PageInfo, Result<(), BuildError>)> = pages
            .par_iter()
            .map(|page| (page, self.build_page(page, &skeleton, &css_hash)))
            .collect();

        let mut built = 0;
        let mut failed = Vec::new();

        for (page, result) in results {
            match result {
                Ok(()) => built += 1,
                Err(e) => {
                    tracing::error!("{}", e);
                    failed.push(PageFailure {
                        path: page.relative_path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: built,
            components: self.registry.len(),
            failed,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    /// Discover all HTML pages in the pages directory.
    fn discover_pages(&self) -> Result<Vec<PageInfo>, BuildError> {
        let pages_dir = self.config.pages_dir();
        if !pages_dir.is_dir() {
            return Err(BuildError::PagesNotFound(pages_dir));
        }

        let mut pages = Vec::new();

        for entry in WalkDir::new(&pages_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }

            let text = fs::read_to_string(path)
                .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;

            let relative_path = path.strip_prefix(&pages_dir).unwrap_or(path).to_path_buf();
            let page_id = relative_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("index")
                .to_string();

            pages.push(PageInfo {
                output_path: self.config.output_dir.join(&relative_path),
                relative_path,
                page_id,
                text,
            });
        }

        tracing::debug!("Discovered {} pages in {}", pages.len(), pages_dir.display());

        Ok(pages)
    }

    /// Build a single page.
    fn build_page(&self, page: &PageInfo, skeleton: &str, css_hash: &str) -> Result<(), BuildError> {
        let source = PageSource {
            text: &page.text,
            skeleton,
            page_id: &page.page_id,
            css_hash,
        };

        let rendered = render_page(&source, &self.registry).map_err(|source| BuildError::Render {
            path: page.relative_path.clone(),
            source,
        })?;

        let html = AssetPipeline::inject_assets(&rendered.html, &rendered.assets, self.config.minify);

        write_page(&page.output_path, &html)?;

        tracing::info!(
            "Built {} ({})",
            page.relative_path.display(),
            if rendered.title.is_empty() { &page.page_id } else { &rendered.title }
        );

        Ok(())
    }
}

fn write_page(path: &Path, html: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(format!("{}: {}", parent.display(), e)))?;
    }
    fs::write(path, html).map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SKELETON: &str = "<html><head><title>#PAGE_HEAD_TITLE</title>\
                            <link rel=\"stylesheet\" href=\"/style.css?v=#CSS_HASH\"></head>\
                            <body id=\"#PAGE_ID\">#PAGE_CONTENT</body></html>";

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project(root: &Path) {
        write(root, "src/skeleton.html", SKELETON);
        write(root, "src/style.css", "body { margin: 0; }");
        write(
            root,
            "src/components/button/button.html",
            "#INPUT label\n<a class=\"btn\">{label}</a>",
        );
        write(root, "src/components/button/button.css", ".btn { color: red; }");
        write(root, "src/components/button/button.js", "console.log('button');");
        write(
            root,
            "src/pages/index.html",
            "#PAGE_TITLE:Home\n<h1>#PAGE_TITLE</h1><c-button label=\"Go\"/>",
        );
        write(root, "src/pages/docs/guide.html", "#PAGE_TITLE:Guide\n<p>guide</p>");
    }

    fn config(root: &Path) -> BuildConfig {
        BuildConfig {
            project_dir: root.to_path_buf(),
            output_dir: root.join("dist"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_simple_site() {
        let temp = tempdir().unwrap();
        project(temp.path());

        let result = StaticBuilder::new(config(temp.path())).build().await.unwrap();

        assert_eq!(result.pages, 2);
        assert_eq!(result.components, 1);
        assert!(result.is_success());

        let out = temp.path().join("dist");
        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("<title>Home</title>"));
        assert!(index.contains("<body id=\"index\">"));
        assert!(index.contains("<h1>#PAGE_TITLE</h1>"));
        assert!(index.contains("<style data-component=\"button\">.btn_"));
        assert!(index.contains("<script data-component=\"button\">console.log('button');</script>\n</body>"));
        assert!(!index.contains("#CSS_HASH"));

        assert!(out.join("docs/guide.html").is_file());
        assert!(out.join("style.css").is_file());
    }

    #[tokio::test]
    async fn failed_pages_are_reported_without_output() {
        let temp = tempdir().unwrap();
        project(temp.path());
        write(temp.path(), "src/pages/broken.html", "<c-missing/>");

        let result = StaticBuilder::new(config(temp.path())).build().await.unwrap();

        assert_eq!(result.pages, 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, PathBuf::from("broken.html"));
        assert!(result.failed[0].message.contains("Unknown component"));
        assert!(!temp.path().join("dist/broken.html").exists());
    }

    #[tokio::test]
    async fn unreadable_component_does_not_hide_later_ones() {
        let temp = tempdir().unwrap();
        project(temp.path());
        let broken = temp.path().join("src/components/alert/alert.html");
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, [0xff, 0xfe, b'<']).unwrap();

        let result = StaticBuilder::new(config(temp.path())).build().await.unwrap();

        assert_eq!(result.components, 1);
        assert!(result.is_success());
        let index = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert!(index.contains(">Go</a>"));
    }

    #[tokio::test]
    async fn css_hash_is_stable_across_builds() {
        let temp = tempdir().unwrap();
        project(temp.path());
        let builder = StaticBuilder::new(config(temp.path()));
        let index = temp.path().join("dist/index.html");

        builder.build().await.unwrap();
        let first = fs::read_to_string(&index).unwrap();
        builder.build().await.unwrap();
        let second = fs::read_to_string(&index).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn minifies_component_styles() {
        let temp = tempdir().unwrap();
        project(temp.path());

        StaticBuilder::new(BuildConfig {
            minify: true,
            ..config(temp.path())
        })
        .build()
        .await
        .unwrap();

        let index = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert!(index.contains("{color:red}</style>"));
        assert_eq!(
            fs::read_to_string(temp.path().join("dist/style.css")).unwrap(),
            "body{margin:0}"
        );
    }

    #[tokio::test]
    async fn errors_without_skeleton() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/pages/index.html", "x");

        let result = StaticBuilder::new(config(temp.path())).build().await;

        assert!(matches!(result, Err(BuildError::SkeletonNotFound(_))));
    }

    #[tokio::test]
    async fn errors_without_pages_directory() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/skeleton.html", SKELETON);

        let result = StaticBuilder::new(config(temp.path())).build().await;

        assert!(matches!(result, Err(BuildError::PagesNotFound(_))));
    }
}
