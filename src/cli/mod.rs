//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Concurrency;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// twine - Bundle a resolved component tree into scripts, styles and assets
#[derive(Parser)]
#[command(name = "twine")]
#[command(about = "twine - Bundle a resolved component tree into scripts, styles and assets")]
#[command(version)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the configured bundles
    Build(BuildArgs),
}

#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Config file (default: nearest twine.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Resolved component tree (JSON)
    #[arg(long)]
    pub tree: Option<PathBuf>,

    /// Build the scripts bundle
    #[arg(long)]
    pub scripts: bool,

    /// Build the styles bundle
    #[arg(long)]
    pub styles: bool,

    /// Publish asset files
    #[arg(long)]
    pub files: bool,

    /// Development mode (dev manifest fields, source annotations, aliases)
    #[arg(short, long)]
    pub dev: bool,

    /// Maximum in-flight file tasks, or "unbounded"
    #[arg(short = 'j', long)]
    pub concurrency: Option<Concurrency>,

    /// Omit the module loader from the scripts bundle
    #[arg(long)]
    pub no_bootstrap: bool,

    /// Scripts bundle path
    #[arg(long)]
    pub out_scripts: Option<PathBuf>,

    /// Styles bundle path
    #[arg(long)]
    pub out_styles: Option<PathBuf>,

    /// Asset destination directory
    #[arg(long)]
    pub out_files: Option<PathBuf>,

    /// Prefix for rewritten stylesheet URLs
    #[arg(long)]
    pub url_prefix: Option<String>,

    /// Watch for changes and rebuild automatically
    #[arg(short, long)]
    pub watch: bool,
}

/// Install the log subscriber; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "twine=debug" } else { "twine=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse arguments and run the requested command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build(args) => build::run_build(args, cli.verbose),
    }
}
