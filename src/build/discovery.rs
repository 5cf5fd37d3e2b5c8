//! Manifest field discovery.
//!
//! Expands the path entries of a manifest field into concrete file paths
//! relative to the branch root. Literal entries are kept as written; glob
//! entries are matched against the filesystem.

use glob::glob;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Error during field discovery.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Expands field entries into relative file paths.
///
/// Implementations must be deterministic: the same inputs on the same
/// filesystem state yield the same list in the same order.
pub trait GlobExpander: Send + Sync {
    /// Expand `patterns` relative to `base_dir`.
    fn expand(&self, base_dir: &Path, patterns: &[String]) -> Result<Vec<String>, DiscoveryError>;
}

/// Filesystem-backed [`GlobExpander`].
///
/// Entries without glob metacharacters pass through unchanged, even when the
/// file does not exist, so a missing declared file surfaces as a read error.
/// Glob matches are sorted; the first occurrence of a path wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsGlob;

impl GlobExpander for FsGlob {
    fn expand(&self, base_dir: &Path, patterns: &[String]) -> Result<Vec<String>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in patterns {
            let pattern = normalize_entry(pattern);
            if pattern.is_empty() {
                continue;
            }

            if !is_glob(pattern) {
                if seen.insert(pattern.to_string()) {
                    files.push(pattern.to_string());
                }
                continue;
            }

            for path in discover_files(base_dir, pattern)? {
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }
}

/// Match one glob pattern under `base_dir`, returning sorted relative paths.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<String>, DiscoveryError> {
    let full_pattern = base_dir.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let paths = glob(&pattern_str).map_err(|e| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(base_dir) {
                    let parts: Vec<_> =
                        relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
                    files.push(parts.join("/"));
                }
            }
            Err(e) => {
                // Log but continue on unreadable entries
                warn!(error = %e, "error reading path during discovery");
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Check whether a field entry is a glob pattern.
pub fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '[', '{'])
}

fn normalize_entry(entry: &str) -> &str {
    entry.trim().trim_start_matches("./")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("lib/*.js"));
        assert!(is_glob("lib/**"));
        assert!(is_glob("a?.js"));
        assert!(!is_glob("lib/index.js"));
    }

    #[test]
    fn test_literal_entries_keep_declared_order() {
        let temp = TempDir::new().unwrap();
        let files = FsGlob.expand(temp.path(), &strings(&["b.js", "./a.js", "b.js"])).unwrap();
        assert_eq!(files, vec!["b.js", "a.js"]);
    }

    #[test]
    fn test_glob_entries_sorted_and_deduplicated() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "lib/z.js");
        create_test_file(temp.path(), "lib/a.js");
        create_test_file(temp.path(), "lib/nested/m.js");
        create_test_file(temp.path(), "lib/readme.md");

        let files = FsGlob
            .expand(temp.path(), &strings(&["lib/z.js", "lib/**/*.js"]))
            .unwrap();
        assert_eq!(files, vec!["lib/z.js", "lib/a.js", "lib/nested/m.js"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let result = FsGlob.expand(temp.path(), &strings(&["lib/[*.js"]));
        assert!(matches!(result, Err(DiscoveryError::InvalidPattern { .. })));
    }
}
