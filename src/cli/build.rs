//! Build command implementation

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use super::{BuildArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{ArtifactResult, BuildContext, BuildReport};
use crate::config::loader::{
    default_config, find_config, load_config, merge_cli_overrides, project_root, CliOverrides,
    ConfigError,
};
use crate::config::TwineConfig;
use crate::tree::load_tree;
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Which artifacts one invocation produces.
#[derive(Debug, Clone, Copy)]
struct Selection {
    scripts: bool,
    styles: bool,
    files: bool,
}

impl Selection {
    /// No flag means everything.
    fn from_args(args: &BuildArgs) -> Self {
        if !args.scripts && !args.styles && !args.files {
            return Self { scripts: true, styles: true, files: true };
        }
        Self { scripts: args.scripts, styles: args.styles, files: args.files }
    }
}

/// Run the build command
pub fn run_build(args: BuildArgs, verbose: bool) -> ExitCode {
    let (mut config, project_root) = match load(&args, verbose) {
        Ok(loaded) => loaded,
        Err(ConfigError::Validation(errors)) => {
            eprintln!("Error loading config:");
            for error in errors {
                eprintln!("  - {}", error);
            }
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // Apply CLI overrides to config
    let overrides = CliOverrides {
        tree: args.tree.clone(),
        scripts_out: args.out_scripts.clone(),
        styles_out: args.out_styles.clone(),
        files_out: args.out_files.clone(),
        concurrency: args.concurrency,
        development: args.dev.then_some(true),
        bootstrap: args.no_bootstrap.then_some(false),
        url_prefix: args.url_prefix.clone(),
    };
    merge_cli_overrides(&mut config, &overrides);

    let selection = Selection::from_args(&args);
    let context = BuildContext::new(config, project_root);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if args.watch {
        let options = watch_options(&context);
        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        match runtime.block_on(watch_and_rebuild(options, || build_once(&context, selection))) {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        }
    } else {
        let report = runtime.block_on(build_once(&context, selection));
        if report.is_success() {
            println!("{}", report.summary());
            ExitCode::from(EXIT_SUCCESS)
        } else {
            eprintln!("{}", report.summary());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Load the config and find the project root.
fn load(args: &BuildArgs, verbose: bool) -> Result<(TwineConfig, PathBuf), ConfigError> {
    let cwd = std::env::current_dir()?;
    match args.config.clone().or_else(find_config) {
        Some(config_path) => {
            if verbose {
                println!("Using config: {}", config_path.display());
            }
            let config = load_config(Some(&config_path))?;
            let root = match project_root(&config_path) {
                Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                _ => cwd,
            };
            Ok((config, root))
        }
        None => {
            if verbose {
                println!("No twine.toml found, using defaults");
            }
            Ok((default_config(), cwd))
        }
    }
}

/// Watch the project root, ignoring build outputs.
///
/// Bundles are ignored as files and published assets as a directory. An
/// output that resolves to the project root itself is never ignored.
fn watch_options(context: &BuildContext) -> WatchOptions {
    let output = &context.config().output;
    let mut options = WatchOptions::new(context.project_root());
    options.config = context.config().watch.clone();
    for path in [&output.scripts, &output.styles, &output.files] {
        let ignored = context.resolve_path(path);
        if ignored != context.project_root() && !options.ignore.contains(&ignored) {
            options.ignore.push(ignored);
        }
    }
    options
}

/// Build every selected artifact once.
///
/// Artifacts fail independently; a failed bundle leaves no file behind.
async fn build_once(context: &BuildContext, selection: Selection) -> BuildReport {
    let started = Instant::now();
    let mut report = BuildReport::new();

    let tree = context.tree_path();
    let branches = match load_tree(&tree, &context.components_dir()) {
        Ok(branches) => branches,
        Err(e) => {
            report.add(ArtifactResult::failed("tree", tree, e.to_string(), started.elapsed()));
            return report.with_duration(started.elapsed());
        }
    };
    let output = &context.config().output;

    if selection.scripts {
        let path = context.resolve_path(&output.scripts);
        let begun = Instant::now();
        let stream = crate::scripts(branches.clone(), context.clone()).run();
        report.add(match stream.write_to_file(&path).await {
            Ok(bytes) => ArtifactResult::written("scripts", path, bytes, begun.elapsed()),
            Err(e) => ArtifactResult::failed("scripts", path, e.to_string(), begun.elapsed()),
        });
    }

    if selection.styles {
        let path = context.resolve_path(&output.styles);
        let begun = Instant::now();
        let stream = crate::styles(branches.clone(), context.clone()).run();
        report.add(match stream.write_to_file(&path).await {
            Ok(bytes) => ArtifactResult::written("styles", path, bytes, begun.elapsed()),
            Err(e) => ArtifactResult::failed("styles", path, e.to_string(), begun.elapsed()),
        });
    }

    if selection.files {
        let path = context.resolve_path(&output.files);
        let begun = Instant::now();
        let stream = crate::files(branches, context.clone()).run();
        report.add(match stream.collect_bytes().await {
            Ok(_) => ArtifactResult::published("files", path, begun.elapsed()),
            Err(e) => ArtifactResult::failed("files", path, e.to_string(), begun.elapsed()),
        });
    }

    report.with_duration(started.elapsed())
}
