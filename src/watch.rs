//! Watch mode for automatic rebuilds on file changes
//!
//! Provides debounced file system watching for `twine build --watch`.
//! Changes that arrive while a build runs are coalesced into one rebuild.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::build::BuildReport;
use crate::config::schema::WatchConfig;
use crate::coordinator::BuildCoordinator;

/// Extensions that trigger a rebuild by default.
pub const DEFAULT_EXTENSIONS: &[&str] =
    &["js", "json", "css", "html", "png", "jpg", "gif", "svg", "woff", "ttf"];

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// The watcher stopped delivering events
    ChannelClosed,
    /// Watched directory not found
    SourceNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelClosed => write!(f, "Watch channel closed"),
            WatchError::SourceNotFound(path) => {
                write!(f, "Source directory not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory watched recursively
    pub root: PathBuf,
    /// Paths whose changes never trigger a rebuild (build outputs)
    pub ignore: Vec<PathBuf>,
    /// File extensions that trigger a rebuild
    pub extensions: Vec<String>,
    /// Debounce and screen settings
    pub config: WatchConfig,
}

impl WatchOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: vec![],
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            config: WatchConfig::default(),
        }
    }

    /// Whether a change to `path` should trigger a rebuild.
    pub fn is_trigger(&self, path: &Path) -> bool {
        !self.ignore.iter().any(|ignored| path.starts_with(ignored))
            && is_relevant_file(path, &self.extensions)
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Watch `options.root` and call `build` after relevant changes.
///
/// Runs one build immediately, then rebuilds on change until the watcher
/// fails. Build failures are reported and watching continues. Changes seen
/// during a build queue at most one rebuild.
pub async fn watch_and_rebuild<F, Fut>(
    options: WatchOptions,
    mut build: F,
) -> Result<(), WatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BuildReport>,
{
    if !options.root.exists() {
        return Err(WatchError::SourceNotFound(options.root.clone()));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
    let debounce_duration = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, move |events: DebounceEventResult| {
        let _ = tx.send(events);
    })
    .map_err(WatchError::WatcherInit)?;
    debouncer
        .watcher()
        .watch(&options.root, RecursiveMode::Recursive)
        .map_err(WatchError::WatchPath)?;

    let coordinator = BuildCoordinator::new();
    let clear = options.config.clear_screen;

    loop {
        let mut running = pin!(coordinator.run(|| {
            if clear {
                clear_screen();
            }
            println!("[{}] Building...", timestamp());
            let pending = build();
            async move { print_report(&pending.await) }
        }));
        let runs = loop {
            tokio::select! {
                runs = &mut running => break runs,
                events = rx.recv() => {
                    if changed(&options, events)? {
                        let request = coordinator.request_build();
                        debug!(?request, "change during build");
                    }
                }
            }
        };
        debug!(runs, "builds settled");

        println!("[{}] Watching {} for changes...", timestamp(), options.root.display());
        while !changed(&options, rx.recv().await)? {}
    }
}

/// Log changed files; `true` when any of them triggers a rebuild.
fn changed(
    options: &WatchOptions,
    events: Option<DebounceEventResult>,
) -> Result<bool, WatchError> {
    match events.ok_or(WatchError::ChannelClosed)? {
        Ok(events) => {
            let mut relevant = false;
            for event in events {
                if matches!(event.kind, DebouncedEventKind::Any)
                    && options.is_trigger(&event.path)
                {
                    if let Some(name) = event.path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                    relevant = true;
                }
            }
            Ok(relevant)
        }
        Err(error) => {
            // Watch error (non-fatal) - log but continue watching
            warn!(error = ?error, "watch error, continuing");
            Ok(false)
        }
    }
}

/// Check if a file is relevant for rebuilding
pub fn is_relevant_file(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    } else {
        false
    }
}

/// Print a build report with a timestamp
fn print_report(report: &BuildReport) {
    if report.is_success() {
        println!("[{}] Build complete ({})", timestamp(), format_duration(report.total_duration));
        for artifact in &report.artifacts {
            println!(
                "          {} -> {} ({})",
                artifact.kind,
                artifact.path.display(),
                artifact.status
            );
        }
    } else {
        let error_count = report.failed_count();
        println!(
            "[{}] Build failed ({}) - {} error{}",
            timestamp(),
            format_duration(report.total_duration),
            error_count,
            if error_count == 1 { "" } else { "s" }
        );
        for artifact in report.failures() {
            eprintln!("[{}] Error in {}: {}", timestamp(), artifact.kind, artifact.status);
        }
    }
}
