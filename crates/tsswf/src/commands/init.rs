//! Scaffold a new project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::build::CONFIG_FILE;

/// Files written by `init`, relative to the project directory.
const SCAFFOLD: &[(&str, &str)] = &[
    (CONFIG_FILE, DEFAULT_CONFIG),
    ("src/skeleton.html", DEFAULT_SKELETON),
    ("src/style.css", DEFAULT_STYLE),
    ("src/pages/index.html", DEFAULT_INDEX),
    ("src/components/button/button.html", DEFAULT_BUTTON),
    ("src/components/button/button.css", DEFAULT_BUTTON_CSS),
];

/// Run the init command.
pub async fn run(project: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing tsswf project in {}...", project.display());

    let mut written = 0;

    for (relative, content) in SCAFFOLD {
        let path = project.join(relative);

        if path.exists() && !yes {
            tracing::warn!("{} already exists. Use --yes to overwrite.", relative);
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
        written += 1;
    }

    fs::create_dir_all(project.join("src/static")).context("Failed to create static directory")?;

    tracing::info!("Initialization complete! ({} files written)", written);
    tracing::info!("Run 'tsswf build' to build the site.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# tsswf configuration

[build]
# Output directory for the built site
output = "dist"

# Minify component and global CSS
minify = false

# Changing the seed changes every scoped class name
scope_seed = ""
"#;

const DEFAULT_SKELETON: &str = r#"#SHOW_HEADER:true
<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>#PAGE_HEAD_TITLE</title>
  <link rel="stylesheet" href="/style.css?v=#CSS_HASH">
</head>
<body id="page-#PAGE_ID">
@IF(SHOW_HEADER) {
  <header>
    <a href="/index.html">My Site</a>
  </header>
}
  <main>
#PAGE_CONTENT
  </main>
</body>
</html>
"#;

const DEFAULT_STYLE: &str = r#"body {
  font-family: system-ui, -apple-system, sans-serif;
  margin: 0 auto;
  max-width: 48rem;
  padding: 1rem;
}
"#;

const DEFAULT_INDEX: &str = r#"#PAGE_TITLE:Home
#PAGE_HEAD_TITLE:Home | My Site
#SHOW_INTRO:true
<h1>Welcome</h1>

@IF(SHOW_INTRO) {
  <p>This page was built by tsswf.</p>
} @ELSE {
  <p>Nothing to see here.</p>
}

<c-button label="Get started" href="/index.html" variant="primary"/>
"#;

const DEFAULT_BUTTON: &str = r#"#INPUT label
#INPUT href
#INPUT variant
<a class="button @IF(variant == "primary") {primary}" href="{href}">{label}</a>
"#;

const DEFAULT_BUTTON_CSS: &str = r#".button {
  display: inline-block;
  padding: 0.5rem 1rem;
  border-radius: 0.375rem;
  border: 1px solid currentColor;
  text-decoration: none;
}

.button.primary {
  background: #2563eb;
  color: #fff;
}
"#;
