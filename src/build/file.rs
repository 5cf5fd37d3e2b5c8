//! Per-file build records.

use std::path::PathBuf;
use std::sync::Arc;

use super::error::BuildError;
use super::extract::BranchManifest;
use crate::tree::Branch;

/// Content state of a file as it moves through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FileContent {
    /// Not claimed by any step: the file contributes no output
    #[default]
    Unset,
    /// Claimed, but the text has not been read yet
    Deferred,
    /// Claimed and loaded
    Loaded(String),
}

impl FileContent {
    /// Whether some step claimed the file.
    pub fn is_set(&self) -> bool {
        !matches!(self, FileContent::Unset)
    }
}

/// One file of one branch, carrying everything steps and wrappers need.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the branch root, `/`-separated
    pub path: String,
    /// Absolute path on disk
    pub filename: PathBuf,
    /// Extension without the dot, empty when there is none
    pub extension: String,
    /// Manifest field that declared the file
    pub field: String,
    /// Canonical module name
    pub name: String,
    /// The owning branch's extracted manifest
    pub manifest: Arc<BranchManifest>,
    /// Content state
    pub content: FileContent,
    /// Serialize as a literal definition rather than a module function
    pub define: bool,
    /// Source map attached by a transform step
    pub source_map: Option<String>,
    /// Extra module name registered for this file
    pub alias: Option<String>,
}

impl FileEntry {
    /// The owning branch.
    pub fn branch(&self) -> &Branch {
        &self.manifest.branch
    }

    /// Whether this is the branch's entry point.
    pub fn is_main(&self) -> bool {
        self.manifest.main.as_deref() == Some(self.path.as_str())
    }

    /// Claim the file without reading it.
    pub fn defer(&mut self) {
        if self.content == FileContent::Unset {
            self.content = FileContent::Deferred;
        }
    }

    /// Drop the file from the output.
    pub fn exclude(&mut self) {
        self.content = FileContent::Unset;
    }

    /// Whether the text is in memory.
    pub fn is_loaded(&self) -> bool {
        matches!(self.content, FileContent::Loaded(_))
    }

    /// The loaded text, if any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            FileContent::Loaded(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content = FileContent::Loaded(text.into());
    }

    /// Read the file from disk unless already loaded.
    pub async fn load(&mut self) -> Result<(), BuildError> {
        if self.is_loaded() {
            return Ok(());
        }
        let text = tokio::fs::read_to_string(&self.filename)
            .await
            .map_err(|e| BuildError::read(self.branch().canonical_name(), self.path.clone(), e))?;
        self.content = FileContent::Loaded(text);
        Ok(())
    }
}

/// Extension of a relative path, without the dot.
pub fn extension_of(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(i) if i > 0 => file_name[i + 1..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::extract::BranchManifest;
    use crate::tree::{Branch, Manifest};
    use tempfile::TempDir;

    fn entry_in(dir: &std::path::Path, path: &str) -> FileEntry {
        let branch = Branch::local("app", dir)
            .with_manifest(Manifest::named("app").with_field("scripts", vec![path]));
        let manifest = Arc::new(BranchManifest::new(
            Arc::new(branch),
            vec![("scripts".to_string(), vec![path.to_string()])],
        ));
        manifest.entries().remove(0)
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("index.js"), "js");
        assert_eq!(extension_of("lib/data.min.json"), "json");
        assert_eq!(extension_of("lib.d/README"), "");
        assert_eq!(extension_of(".eslintrc"), "");
    }

    #[test]
    fn test_defer_does_not_clobber_loaded() {
        let temp = TempDir::new().unwrap();
        let mut file = entry_in(temp.path(), "index.js");
        assert!(!file.content.is_set());

        file.set_text("x");
        file.defer();
        assert_eq!(file.text(), Some("x"));

        file.exclude();
        assert!(!file.content.is_set());
        file.defer();
        assert_eq!(file.content, FileContent::Deferred);
    }

    #[tokio::test]
    async fn test_load_reads_once() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.js"), "module.exports = 1;").unwrap();
        let mut file = entry_in(temp.path(), "index.js");

        file.defer();
        file.load().await.unwrap();
        assert_eq!(file.text(), Some("module.exports = 1;"));

        std::fs::write(temp.path().join("index.js"), "changed").unwrap();
        file.load().await.unwrap();
        assert_eq!(file.text(), Some("module.exports = 1;"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let mut file = entry_in(temp.path(), "missing.js");
        let err = file.load().await.unwrap_err();
        assert!(matches!(err, BuildError::Read { ref path, .. } if path == "missing.js"));
    }
}
