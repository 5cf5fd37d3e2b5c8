//! Configuration schema types for `twine.toml`
//!
//! Defines the structure and validation rules for twine project configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How many file tasks may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConcurrencyRepr", into = "ConcurrencyRepr")]
pub enum Concurrency {
    /// At most this many tasks (always at least one)
    Limited(usize),
    /// No limit
    Unbounded,
}

impl Concurrency {
    /// The task limit, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Concurrency::Limited(n) => Some((*n).max(1)),
            Concurrency::Unbounded => None,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Limited(16)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Limited(n) => write!(f, "{}", n),
            Concurrency::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unbounded" | "unlimited" => Ok(Concurrency::Unbounded),
            other => match other.parse::<usize>() {
                Ok(0) => Err("concurrency must be at least 1".to_string()),
                Ok(n) => Ok(Concurrency::Limited(n)),
                Err(_) => Err(format!("invalid concurrency '{}'", s)),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ConcurrencyRepr {
    Count(usize),
    Word(String),
}

impl TryFrom<ConcurrencyRepr> for Concurrency {
    type Error = String;

    fn try_from(repr: ConcurrencyRepr) -> Result<Self, Self::Error> {
        match repr {
            ConcurrencyRepr::Count(0) => Err("concurrency must be at least 1".to_string()),
            ConcurrencyRepr::Count(n) => Ok(Concurrency::Limited(n)),
            ConcurrencyRepr::Word(word) => word.parse(),
        }
    }
}

impl From<Concurrency> for ConcurrencyRepr {
    fn from(concurrency: Concurrency) -> Self {
        match concurrency {
            Concurrency::Limited(n) => ConcurrencyRepr::Count(n),
            Concurrency::Unbounded => ConcurrencyRepr::Word("unbounded".to_string()),
        }
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Component tree produced by the installer
    #[serde(default = "default_tree")]
    pub tree: PathBuf,
    /// Directory holding installed remote components
    #[serde(default = "default_components")]
    pub components: PathBuf,
}

fn default_name() -> String {
    "app".to_string()
}

fn default_tree() -> PathBuf {
    PathBuf::from("components.json")
}

fn default_components() -> PathBuf {
    PathBuf::from("components")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name(), tree: default_tree(), components: default_components() }
    }
}

/// Build behavior section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Maximum in-flight file tasks
    #[serde(default)]
    pub concurrency: Concurrency,
    /// Development mode: honors `development` manifest entries of local branches
    #[serde(default)]
    pub development: bool,
    /// Prepend the module loader to the scripts bundle
    #[serde(default = "default_true")]
    pub bootstrap: bool,
    /// Register lowercase manifest names of local mains as aliases (defaults to `development`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<bool>,
    /// Embed attached source maps in development output
    #[serde(default)]
    pub source_map: bool,
    /// Annotate modules with their source path (defaults to `development`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<bool>,
    /// Prefix for rewritten stylesheet asset URLs
    #[serde(default)]
    pub url_prefix: String,
}

fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::default(),
            development: false,
            bootstrap: true,
            aliases: None,
            source_map: false,
            source_url: None,
            url_prefix: String::new(),
        }
    }
}

/// Output locations, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Scripts bundle
    #[serde(default = "default_scripts_out")]
    pub scripts: PathBuf,
    /// Styles bundle
    #[serde(default = "default_styles_out")]
    pub styles: PathBuf,
    /// Destination for copied or linked asset files
    #[serde(default = "default_files_out")]
    pub files: PathBuf,
    /// Symlink asset files instead of copying them
    #[serde(default)]
    pub symlink: bool,
}

fn default_scripts_out() -> PathBuf {
    PathBuf::from("build/build.js")
}

fn default_styles_out() -> PathBuf {
    PathBuf::from("build/build.css")
}

fn default_files_out() -> PathBuf {
    PathBuf::from("build")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scripts: default_scripts_out(),
            styles: default_styles_out(),
            files: default_files_out(),
            symlink: false,
        }
    }
}

/// Manifest fields handled by each bundle kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// Fields bundled into the scripts output
    #[serde(default = "default_script_fields")]
    pub scripts: Vec<String>,
    /// Fields bundled into the styles output
    #[serde(default = "default_style_fields")]
    pub styles: Vec<String>,
    /// Fields published as asset files
    #[serde(default = "default_file_fields")]
    pub files: Vec<String>,
}

fn default_script_fields() -> Vec<String> {
    vec!["scripts".to_string(), "json".to_string(), "templates".to_string()]
}

fn default_style_fields() -> Vec<String> {
    vec!["styles".to_string()]
}

fn default_file_fields() -> Vec<String> {
    vec!["images".to_string(), "fonts".to_string(), "files".to_string()]
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            scripts: default_script_fields(),
            styles: default_style_fields(),
            files: default_file_fields(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: false }
    }
}

/// Complete twine.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwineConfig {
    /// Project metadata
    #[serde(default)]
    pub project: ProjectConfig,
    /// Build behavior
    #[serde(default)]
    pub build: BuildConfig,
    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
    /// Field lists per bundle kind
    #[serde(default)]
    pub fields: FieldsConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "fields.scripts")
    pub field: String,
    /// Error message
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "twine.toml: '{}' {}", self.field, self.message)
    }
}

impl TwineConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (kind, fields) in [
            ("scripts", &self.fields.scripts),
            ("styles", &self.fields.styles),
            ("files", &self.fields.files),
        ] {
            if fields.iter().any(|f| f.trim().is_empty()) {
                errors.push(ConfigValidationError {
                    field: format!("fields.{}", kind),
                    message: "must not contain empty field names".to_string(),
                });
            }
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
