//! Build context containing configuration for a build.

use crate::config::{loader, Concurrency, TwineConfig};
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Every task and step of a build sees the same context. Per-call overrides
/// (`with_*`) take precedence over the loaded configuration.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: TwineConfig,
    /// Project root directory (where twine.toml is located)
    project_root: PathBuf,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: TwineConfig, project_root: PathBuf) -> Self {
        Self { config, project_root }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TwineConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Maximum in-flight file tasks.
    pub fn concurrency(&self) -> Concurrency {
        self.config.build.concurrency
    }

    /// Whether development mode is enabled.
    pub fn is_development(&self) -> bool {
        self.config.build.development
    }

    /// Whether the scripts bundle starts with the module loader.
    pub fn bootstrap(&self) -> bool {
        self.config.build.bootstrap
    }

    /// Whether local mains get lowercase-name aliases.
    pub fn aliases(&self) -> bool {
        self.config.build.aliases.unwrap_or(self.config.build.development)
    }

    /// Whether attached source maps are embedded.
    pub fn source_map(&self) -> bool {
        self.config.build.source_map
    }

    /// Whether modules are annotated with their source path.
    pub fn source_url(&self) -> bool {
        self.config.build.source_url.unwrap_or(self.config.build.development)
    }

    /// Prefix for rewritten stylesheet URLs.
    pub fn url_prefix(&self) -> &str {
        &self.config.build.url_prefix
    }

    /// Set task concurrency.
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.config.build.concurrency = concurrency;
        self
    }

    /// Set development mode.
    pub fn with_development(mut self, development: bool) -> Self {
        self.config.build.development = development;
        self
    }

    /// Toggle the module loader preamble.
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.config.build.bootstrap = bootstrap;
        self
    }

    /// Toggle main aliases.
    pub fn with_aliases(mut self, aliases: bool) -> Self {
        self.config.build.aliases = Some(aliases);
        self
    }

    /// Toggle source map embedding.
    pub fn with_source_map(mut self, source_map: bool) -> Self {
        self.config.build.source_map = source_map;
        self
    }

    /// Toggle source path annotations.
    pub fn with_source_url(mut self, source_url: bool) -> Self {
        self.config.build.source_url = Some(source_url);
        self
    }

    /// Set the stylesheet URL prefix.
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.build.url_prefix = prefix.into();
        self
    }

    /// Resolve a path relative to the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        loader::resolve_path(&self.project_root, path)
    }

    /// `filename` relative to the project root, `/`-separated.
    ///
    /// Files outside the root are returned as given.
    pub fn display_path(&self, filename: &Path) -> String {
        match filename.strip_prefix(&self.project_root) {
            Ok(relative) => {
                let parts: Vec<_> =
                    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
                parts.join("/")
            }
            Err(_) => filename.to_string_lossy().into_owned(),
        }
    }

    /// Component tree file (resolved to absolute path).
    pub fn tree_path(&self) -> PathBuf {
        self.resolve_path(&self.config.project.tree)
    }

    /// Installed components directory (resolved to absolute path).
    pub fn components_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.components)
    }
}
