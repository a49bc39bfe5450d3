//! Asset pipeline for CSS and JavaScript processing.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use tsswf_template::PageAssets;

/// Directory under `src/` copied verbatim to `<out>/static/`.
pub const STATIC_DIR: &str = "static";

/// Errors that can occur while processing assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("CSS parse error: {0}")]
    CssParse(String),

    #[error("CSS minify error: {0}")]
    CssMinify(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, AssetError> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| AssetError::CssParse(e.to_string()))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| AssetError::CssMinify(e.to_string()))?;

        Ok(minified.code)
    }

    /// Minify when asked, keeping the original text if lightningcss rejects it.
    fn maybe_minify(css: &str, minify: bool, origin: &str) -> String {
        if !minify {
            return css.to_string();
        }
        match Self::minify_css(css) {
            Ok(minified) => minified,
            Err(e) => {
                tracing::warn!("Leaving {} unminified: {}", origin, e);
                css.to_string()
            }
        }
    }

    /// Global stylesheets and scripts directly under `src_root`, sorted by name.
    pub fn global_assets(src_root: &Path) -> Vec<PathBuf> {
        WalkDir::new(src_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("css") | Some("js")
                    )
            })
            .collect()
    }

    /// Cache-busting hash over the given files: 16 hex chars of SHA-256.
    ///
    /// Stable while the files are unchanged.
    pub fn cache_hash(sources: &[PathBuf]) -> Result<String, AssetError> {
        let mut sorted: Vec<&PathBuf> = sources.iter().collect();
        sorted.sort();

        let mut hasher = Sha256::new();
        for path in sorted {
            let content = fs::read(path).map_err(|source| AssetError::Read {
                path: path.clone(),
                source,
            })?;
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(&content);
            hasher.update([0u8]);
        }

        let digest = format!("{:x}", hasher.finalize());
        Ok(digest[..16].to_string())
    }

    /// Inline component styles before `</head>` and scripts before `</body>`.
    ///
    /// Without those tags styles are prepended and scripts appended.
    pub fn inject_assets(html: &str, assets: &PageAssets, minify: bool) -> String {
        if assets.is_empty() {
            return html.to_string();
        }

        let styles: String = assets
            .styles
            .iter()
            .map(|style| {
                let origin = format!("styles of component {}", style.component);
                format!(
                    "<style data-component=\"{}\">{}</style>\n",
                    style.component,
                    Self::maybe_minify(&style.content, minify, &origin)
                )
            })
            .collect();

        let scripts: String = assets
            .scripts
            .iter()
            .map(|script| {
                format!(
                    "<script data-component=\"{}\">{}</script>\n",
                    script.component, script.content
                )
            })
            .collect();

        let mut output = String::with_capacity(html.len() + styles.len() + scripts.len());

        let body = match html.find("</head>") {
            Some(pos) => {
                output.push_str(&html[..pos]);
                output.push_str(&styles);
                &html[pos..]
            }
            None => {
                output.push_str(&styles);
                html
            }
        };

        match body.rfind("</body>") {
            Some(pos) => {
                output.push_str(&body[..pos]);
                output.push_str(&scripts);
                output.push_str(&body[pos..]);
            }
            None => {
                output.push_str(body);
                output.push_str(&scripts);
            }
        }

        output
    }

    /// Copy global assets to `out_root` and the static tree to
    /// `out_root/static`, returning the number of files copied.
    pub fn copy_static(src_root: &Path, out_root: &Path, minify: bool) -> Result<usize, AssetError> {
        let mut copied = 0;

        for path in Self::global_assets(src_root) {
            let Some(name) = path.file_name() else {
                continue;
            };
            let target = out_root.join(name);

            if path.extension().and_then(|e| e.to_str()) == Some("css") {
                let css = read_to_string(&path)?;
                let css = Self::maybe_minify(&css, minify, &path.display().to_string());
                write(&target, css.as_bytes())?;
            } else {
                copy(&path, &target)?;
            }
            copied += 1;
        }

        let static_root = src_root.join(STATIC_DIR);
        if static_root.is_dir() {
            for entry in WalkDir::new(&static_root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }

                let relative = path.strip_prefix(&static_root).unwrap_or(path);
                copy(path, &out_root.join(STATIC_DIR).join(relative))?;
                copied += 1;
            }
        }

        tracing::debug!("Copied {} asset files to {}", copied, out_root.display());

        Ok(copied)
    }
}

fn read_to_string(path: &Path) -> Result<String, AssetError> {
    fs::read_to_string(path).map_err(|source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), AssetError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AssetError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn write(path: &Path, content: &[u8]) -> Result<(), AssetError> {
    ensure_parent(path)?;
    fs::write(path, content).map_err(|source| AssetError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn copy(from: &Path, to: &Path) -> Result<(), AssetError> {
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|source| AssetError::Write {
        path: to.to_path_buf(),
        source,
    })?;
    Ok(())
}
