//! tsswf CLI - static site generator with components and scoped CSS.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "tsswf")]
#[command(about = "Static site generator with components, conditionals and scoped CSS")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new project
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the static site
    Build {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minify CSS output
        #[arg(long)]
        minify: bool,

        /// Seed for component scope suffixes
        #[arg(long)]
        scope_seed: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { project, yes } => {
            commands::init::run(&project, yes).await?;
        }
        Commands::Build {
            project,
            output,
            minify,
            scope_seed,
        } => {
            let overrides = commands::build::Overrides {
                output,
                minify: minify.then_some(true),
                scope_seed,
            };
            commands::build::run(&project, overrides).await?;
        }
    }

    Ok(())
}
