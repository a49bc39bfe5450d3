//! Static site build command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tsswf_static::{BuildConfig, StaticBuilder};

pub const CONFIG_FILE: &str = "tsswf.toml";

/// Configuration file structure (tsswf.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    build: BuildSettings,
}

#[derive(Debug, Deserialize)]
struct BuildSettings {
    #[serde(default = "default_output")]
    output: String,
    #[serde(default)]
    minify: bool,
    #[serde(default)]
    scope_seed: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            minify: false,
            scope_seed: String::new(),
        }
    }
}

fn default_output() -> String {
    "dist".to_string()
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub minify: Option<bool>,
    pub scope_seed: Option<String>,
}

/// Load configuration from tsswf.toml if it exists.
/// Returns an error if the config file exists but is malformed.
fn load_config(project: &Path) -> Result<ConfigFile> {
    let config_path = project.join(CONFIG_FILE);
    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path.display(), e))?;
        tracing::info!("Loaded config from {}", config_path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

/// Merge the config file with command-line overrides.
fn resolve(project: &Path, file_config: ConfigFile, overrides: Overrides) -> BuildConfig {
    let settings = file_config.build;

    BuildConfig {
        project_dir: project.to_path_buf(),
        output_dir: overrides
            .output
            .unwrap_or_else(|| project.join(&settings.output)),
        minify: overrides.minify.unwrap_or(settings.minify),
        scope_seed: overrides.scope_seed.unwrap_or(settings.scope_seed),
    }
}

/// Run the build command.
pub async fn run(project: &Path, overrides: Overrides) -> Result<()> {
    tracing::info!("Building static site...");

    let config = resolve(project, load_config(project)?, overrides);

    let result = StaticBuilder::new(config).build().await?;

    tracing::info!(
        "Built {} pages with {} components in {}ms",
        result.pages,
        result.components,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    if !result.is_success() {
        for failure in &result.failed {
            tracing::error!("  {}: {}", failure.path.display(), failure.message);
        }
        anyhow::bail!("{} page(s) failed to build", result.failed.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_config_file() {
        let temp = tempdir().unwrap();

        let config = resolve(temp.path(), load_config(temp.path()).unwrap(), Overrides::default());

        assert_eq!(config.output_dir, temp.path().join("dist"));
        assert!(!config.minify);
        assert_eq!(config.scope_seed, "");
    }

    #[test]
    fn reads_config_file() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "[build]\noutput = \"public\"\nminify = true\nscope_seed = \"v2\"\n",
        )
        .unwrap();

        let config = resolve(temp.path(), load_config(temp.path()).unwrap(), Overrides::default());

        assert_eq!(config.output_dir, temp.path().join("public"));
        assert!(config.minify);
        assert_eq!(config.scope_seed, "v2");
    }

    #[test]
    fn overrides_take_precedence() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[build]\nscope_seed = \"file\"\n").unwrap();

        let config = resolve(
            temp.path(),
            load_config(temp.path()).unwrap(),
            Overrides {
                output: Some(PathBuf::from("/tmp/site")),
                minify: Some(true),
                scope_seed: Some("flag".to_string()),
            },
        );

        assert_eq!(config.output_dir, PathBuf::from("/tmp/site"));
        assert!(config.minify);
        assert_eq!(config.scope_seed, "flag");
    }

    #[test]
    fn rejects_malformed_config() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[build\nminify = ").unwrap();

        assert!(load_config(temp.path()).is_err());
    }

    #[tokio::test]
    async fn fails_when_a_page_fails() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("pages")).unwrap();
        fs::write(src.join("skeleton.html"), "#PAGE_CONTENT").unwrap();
        fs::write(src.join("pages/ok.html"), "fine").unwrap();
        fs::write(src.join("pages/bad.html"), "<c-nope/>").unwrap();

        let result = run(temp.path(), Overrides::default()).await;

        assert!(result.unwrap_err().to_string().contains("1 page(s) failed"));
        assert!(temp.path().join("dist/ok.html").is_file());
    }
}
