//! Configuration loading and discovery for `twine.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{Concurrency, TwineConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "twine.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse twine.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", bullets(.0))]
    Validation(Vec<String>),
}

fn bullets(errors: &[String]) -> String {
    errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n")
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the component tree path
    pub tree: Option<PathBuf>,
    /// Override the scripts bundle path
    pub scripts_out: Option<PathBuf>,
    /// Override the styles bundle path
    pub styles_out: Option<PathBuf>,
    /// Override the asset files destination
    pub files_out: Option<PathBuf>,
    /// Override task concurrency
    pub concurrency: Option<Concurrency>,
    /// Enable development mode
    pub development: Option<bool>,
    /// Toggle the module loader preamble
    pub bootstrap: Option<bool>,
    /// Override the stylesheet URL prefix
    pub url_prefix: Option<String>,
}

/// Find twine.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a twine.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find twine.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a twine.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("site/twine.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<TwineConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<TwineConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: TwineConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no twine.toml is found.
///
/// The project name is the current directory name.
pub fn default_config() -> TwineConfig {
    let mut config = TwineConfig::default();
    let cwd = env::current_dir().ok();
    if let Some(name) = cwd.as_deref().and_then(Path::file_name) {
        config.project.name = name.to_string_lossy().into_owned();
    }
    config
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut TwineConfig, overrides: &CliOverrides) {
    if let Some(ref tree) = overrides.tree {
        config.project.tree = tree.clone();
    }
    if let Some(ref scripts) = overrides.scripts_out {
        config.output.scripts = scripts.clone();
    }
    if let Some(ref styles) = overrides.styles_out {
        config.output.styles = styles.clone();
    }
    if let Some(ref files) = overrides.files_out {
        config.output.files = files.clone();
    }
    if let Some(concurrency) = overrides.concurrency {
        config.build.concurrency = concurrency;
    }
    if let Some(development) = overrides.development {
        config.build.development = development;
    }
    if let Some(bootstrap) = overrides.bootstrap {
        config.build.bootstrap = bootstrap;
    }
    if let Some(ref prefix) = overrides.url_prefix {
        config.build.url_prefix = prefix.clone();
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the twine.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &[u8]) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents)
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[project]\nname = \"test\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[project]\nname = \"test\"");

        let subdir = temp.path().join("client").join("widgets");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, None);
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            br#"
[project]
name = "test-project"

[build]
concurrency = 2
development = true
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.project.name, "test-project");
        assert_eq!(config.build.concurrency, Concurrency::Limited(2));
        assert!(config.build.development);
    }

    #[test]
    fn test_load_config_missing_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"this is not valid toml {{{");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[project]\nname = \"\"\n");

        let result = load_config(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_merge_cli_overrides() {
        let mut config = default_config();
        let overrides = CliOverrides {
            scripts_out: Some(PathBuf::from("dist/app.js")),
            concurrency: Some(Concurrency::Unbounded),
            development: Some(true),
            url_prefix: Some("/static/".to_string()),
            ..Default::default()
        };

        merge_cli_overrides(&mut config, &overrides);
        assert_eq!(config.output.scripts, PathBuf::from("dist/app.js"));
        assert_eq!(config.output.styles, PathBuf::from("build/build.css"));
        assert_eq!(config.build.concurrency, Concurrency::Unbounded);
        assert!(config.build.development);
        assert!(config.build.bootstrap);
        assert_eq!(config.build.url_prefix, "/static/");
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/project");
        assert_eq!(resolve_path(root, Path::new("/other/path")), PathBuf::from("/other/path"));
        assert_eq!(resolve_path(root, Path::new("build")), PathBuf::from("/project/build"));
    }

    #[test]
    fn test_project_root() {
        let config_path = Path::new("/project/twine.toml");
        assert_eq!(project_root(config_path), Some(Path::new("/project")));
    }

    #[test]
    #[serial]
    fn test_find_config_from_working_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), b"[project]\nname = \"site\"");
        let subdir = temp.path().join("storefront");
        fs::create_dir_all(&subdir).expect("should create subdirectory");

        let original = env::current_dir().expect("should read working dir");
        env::set_current_dir(&subdir).expect("should enter subdirectory");
        let found = find_config();
        let loaded = load_config(None);
        let defaults = default_config();
        env::set_current_dir(original).expect("should restore working dir");

        let found = found.expect("should find config in parent");
        assert_eq!(found.canonicalize().unwrap(), config_path.canonicalize().unwrap());
        assert_eq!(loaded.expect("should load found config").project.name, "site");
        assert_eq!(defaults.project.name, "storefront");
    }

    #[test]
    #[serial]
    fn test_default_config() {
        let config = default_config();
        assert!(!config.project.name.is_empty());
        assert_eq!(config.project.components, PathBuf::from("components"));
        assert_eq!(config.output.files, PathBuf::from("build"));
    }
}
