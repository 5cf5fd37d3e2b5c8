//! Field extraction.
//!
//! Turns a branch into a [`BranchManifest`]: the files each configured field
//! declares, the resolved entry point and every file's canonical name.
//! Extraction is memoized per canonical branch name for the lifetime of one
//! build, so nested resolution never re-expands a branch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use super::discovery::GlobExpander;
use super::error::BuildError;
use super::file::{extension_of, FileContent, FileEntry};
use crate::tree::Branch;

/// A file declared by a branch, with its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Manifest field that declared the file
    pub field: String,
    /// Path relative to the branch root
    pub path: String,
    /// Canonical module name
    pub name: String,
}

/// The extracted view of one branch.
#[derive(Debug)]
pub struct BranchManifest {
    /// The branch itself
    pub branch: Arc<Branch>,
    /// Canonical branch name (also the entry point's module name)
    pub name: String,
    /// Entry point path, when the branch declares any files
    pub main: Option<String>,
    /// Every declared file, fields in configured order
    pub files: Vec<FileRecord>,
}

impl BranchManifest {
    /// Build a manifest from already-expanded fields.
    pub fn new(branch: Arc<Branch>, fields: Vec<(String, Vec<String>)>) -> Self {
        let name = branch.canonical_name();
        let paths: Vec<(String, String)> = fields
            .into_iter()
            .flat_map(|(field, paths)| paths.into_iter().map(move |p| (field.clone(), p)))
            .collect();
        let main = resolve_main(&branch, paths.iter().map(|(_, p)| p.as_str()));

        let files = paths
            .into_iter()
            .map(|(field, path)| {
                let name = module_name(&name, main.as_deref(), &path);
                FileRecord { field, path, name }
            })
            .collect();

        Self { branch, name, main, files }
    }

    /// Whether the branch declares no files in any configured field.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up a declared file by relative path.
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Fresh pipeline records for every declared file, in dispatch order.
    pub fn entries(self: &Arc<Self>) -> Vec<FileEntry> {
        self.files
            .iter()
            .map(|record| FileEntry {
                path: record.path.clone(),
                filename: join_relative(&self.branch.path, &record.path),
                extension: extension_of(&record.path),
                field: record.field.clone(),
                name: record.name.clone(),
                manifest: Arc::clone(self),
                content: FileContent::Unset,
                define: false,
                source_map: None,
                alias: None,
            })
            .collect()
    }
}

/// Entry point: the declared `main` (leading `./` stripped), else the first
/// `index.<ext>` file, else the first file.
fn resolve_main<'a>(
    branch: &Branch,
    mut paths: impl Iterator<Item = &'a str> + Clone,
) -> Option<String> {
    if let Some(main) = &branch.manifest.main {
        let main = main.trim_start_matches("./");
        if !main.is_empty() {
            return Some(main.to_string());
        }
    }
    if let Some(index) = paths.clone().find(|p| is_index(p)) {
        return Some(index.to_string());
    }
    paths.next().map(str::to_string)
}

fn is_index(path: &str) -> bool {
    path.strip_prefix("index.")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn module_name(branch_name: &str, main: Option<&str>, path: &str) -> String {
    if main == Some(path) {
        branch_name.to_string()
    } else {
        format!("{}/{}", branch_name, path)
    }
}

fn join_relative(root: &Path, relative: &str) -> std::path::PathBuf {
    relative.split('/').filter(|s| !s.is_empty()).fold(root.to_path_buf(), |acc, s| acc.join(s))
}

/// Memoizing field extractor shared by one build's tasks.
pub struct FieldExtractor {
    glob: Arc<dyn GlobExpander>,
    fields: Vec<String>,
    development: bool,
    cache: Mutex<HashMap<String, Arc<OnceCell<Arc<BranchManifest>>>>>,
}

impl std::fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldExtractor")
            .field("fields", &self.fields)
            .field("development", &self.development)
            .finish_non_exhaustive()
    }
}

impl FieldExtractor {
    /// Create an extractor for `fields`.
    ///
    /// With `development` set, local branches also contribute their
    /// `development.<field>` entries.
    pub fn new(glob: Arc<dyn GlobExpander>, fields: Vec<String>, development: bool) -> Self {
        Self { glob, fields, development, cache: Mutex::new(HashMap::new()) }
    }

    /// Configured field names, in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Extract `branch`, reusing the result of an earlier call.
    pub async fn manifest(&self, branch: &Arc<Branch>) -> Result<Arc<BranchManifest>, BuildError> {
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(branch.canonical_name()).or_default())
        };
        let manifest = cell
            .get_or_try_init(|| async { self.extract(branch).map(Arc::new) })
            .await?;
        Ok(Arc::clone(manifest))
    }

    /// Extract `branch` without consulting the cache.
    pub fn extract(&self, branch: &Arc<Branch>) -> Result<BranchManifest, BuildError> {
        let development = self.development && branch.is_local();
        let mut fields = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let mut patterns = branch.manifest.field(field);
            if development {
                patterns.extend(branch.manifest.development_field(field));
            }
            let paths = if patterns.is_empty() {
                vec![]
            } else {
                self.glob.expand(&branch.path, &patterns)?
            };
            trace!(branch = %branch.name, field = %field, files = paths.len(), "expanded field");
            fields.push((field.clone(), paths));
        }

        let manifest = BranchManifest::new(Arc::clone(branch), fields);
        debug!(branch = %manifest.name, files = manifest.files.len(), "extracted manifest");
        Ok(manifest)
    }
}
