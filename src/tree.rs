//! Resolved component tree.
//!
//! Fetching and installing dependencies happens outside this crate. The
//! installer hands over a flat JSON list of branch records in build order
//! (dependencies before dependents); this module links those records into
//! shared [`Branch`] values.
//!
//! ```json
//! {
//!   "branches": [
//!     { "name": "component/emitter", "ref": "1.1.1", "type": "remote",
//!       "manifest": { "name": "emitter", "scripts": ["index.js"] } },
//!     { "name": "app", "type": "local", "path": ".",
//!       "manifest": { "name": "app", "scripts": ["index.js"] },
//!       "dependencies": { "component/emitter": "1.1.1" } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Whether a branch is part of the project or an installed dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    /// Source that lives in the project
    Local,
    /// Installed third-party component pinned to a ref
    Remote,
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKind::Local => write!(f, "local"),
            BranchKind::Remote => write!(f, "remote"),
        }
    }
}

/// A component's declarative manifest.
///
/// Only `name`, `main` and `development` have fixed meaning. Every other key
/// is kept as raw JSON and read through [`Manifest::field`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Declared component name
    #[serde(default)]
    pub name: String,
    /// Entry point path relative to the branch root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Extra field entries honored for local branches in development builds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub development: BTreeMap<String, Value>,
    /// Remaining manifest keys (`scripts`, `styles`, `version`, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Manifest {
    /// Create a manifest with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Set the entry point.
    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }

    /// Set a field to a list of paths or glob patterns.
    pub fn with_field<S: Into<String>>(mut self, field: &str, paths: Vec<S>) -> Self {
        let values = paths.into_iter().map(|p| Value::String(p.into())).collect();
        self.fields.insert(field.to_string(), Value::Array(values));
        self
    }

    /// Set a development-only field.
    pub fn with_development_field<S: Into<String>>(mut self, field: &str, paths: Vec<S>) -> Self {
        let values = paths.into_iter().map(|p| Value::String(p.into())).collect();
        self.development.insert(field.to_string(), Value::Array(values));
        self
    }

    /// Path entries declared under `field`.
    ///
    /// Non-string entries are ignored; a bare string counts as one entry.
    pub fn field(&self, field: &str) -> Vec<String> {
        string_list(self.fields.get(field))
    }

    /// Path entries declared under `development.<field>`.
    pub fn development_field(&self, field: &str) -> Vec<String> {
        string_list(self.development.get(field))
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => {
            items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
        }
        Some(Value::String(s)) => vec![s.clone()],
        _ => vec![],
    }
}

/// One node of the resolved component tree.
///
/// Branches are immutable once linked and shared through `Arc`, so the same
/// dependency reached from several dependents is one value.
#[derive(Debug)]
pub struct Branch {
    /// `owner/repo` for remote branches, a bare name for local ones
    pub name: String,
    /// Pinned version or ref (remote branches only)
    pub reference: Option<String>,
    /// Local or remote
    pub kind: BranchKind,
    /// Absolute directory holding the branch's files
    pub path: PathBuf,
    /// The branch's manifest
    pub manifest: Manifest,
    /// Remote dependencies keyed by `owner/repo`
    pub dependencies: BTreeMap<String, Arc<Branch>>,
    /// Local dependencies keyed by name
    pub locals: BTreeMap<String, Arc<Branch>>,
}

impl Branch {
    /// Create a local branch with an empty manifest.
    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name.into(), None, BranchKind::Local, path.into())
    }

    /// Create a remote branch with an empty manifest.
    pub fn remote(
        name: impl Into<String>,
        reference: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::new(name.into(), Some(reference.into()), BranchKind::Remote, path.into())
    }

    fn new(name: String, reference: Option<String>, kind: BranchKind, path: PathBuf) -> Self {
        Self {
            name,
            reference,
            kind,
            path,
            manifest: Manifest::default(),
            dependencies: BTreeMap::new(),
            locals: BTreeMap::new(),
        }
    }

    /// Set the manifest.
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Add a remote dependency, keyed by its `owner/repo` name.
    pub fn with_dependency(mut self, dependency: Arc<Branch>) -> Self {
        self.dependencies.insert(dependency.name.clone(), dependency);
        self
    }

    /// Add a local dependency, keyed by its name.
    pub fn with_local(mut self, local: Arc<Branch>) -> Self {
        self.locals.insert(local.name.clone(), local);
        self
    }

    /// Whether this branch is project source.
    pub fn is_local(&self) -> bool {
        self.kind == BranchKind::Local
    }

    /// Canonical module name: the bare name for local branches,
    /// `owner/repo@ref` for remote ones.
    pub fn canonical_name(&self) -> String {
        match (&self.kind, &self.reference) {
            (BranchKind::Remote, Some(reference)) => format!("{}@{}", self.name, reference),
            _ => self.name.clone(),
        }
    }

    /// Folder under which the branch's assets are published:
    /// `name` for local branches, `owner/repo/ref` for remote ones.
    pub fn asset_folder(&self) -> String {
        match (&self.kind, &self.reference) {
            (BranchKind::Remote, Some(reference)) => format!("{}/{}", self.name, reference),
            _ => self.name.clone(),
        }
    }
}

/// Error loading or linking a component tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TreeError {
    /// The tree file could not be read
    #[error("Failed to read component tree '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The tree file is not valid JSON
    #[error("Failed to parse component tree: {0}")]
    Parse(#[from] serde_json::Error),
    /// A remote record without a ref
    #[error("Remote branch '{0}' has no ref")]
    MissingRef(String),
    /// A local record without a path
    #[error("Local branch '{0}' has no path")]
    MissingPath(String),
    /// Two records share a canonical name
    #[error("Branch '{0}' appears more than once")]
    Duplicate(String),
    /// A dependency that no record provides
    #[error("Branch '{branch}' depends on '{dependency}', which is not in the tree")]
    UnknownDependency { branch: String, dependency: String },
    /// Records that depend on each other
    #[error("Dependency cycle through '{0}'")]
    Cycle(String),
}

/// One branch as recorded by the installer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    /// `owner/repo` or local name
    pub name: String,
    /// Pinned ref, required for remote branches
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Local or remote
    #[serde(rename = "type")]
    pub kind: BranchKind,
    /// Branch directory, relative to the tree file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// The branch's manifest
    #[serde(default)]
    pub manifest: Manifest,
    /// Remote dependencies: `owner/repo` to ref
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Names of local dependencies
    #[serde(default)]
    pub locals: Vec<String>,
}

impl BranchRecord {
    fn canonical_name(&self) -> String {
        match (&self.kind, &self.reference) {
            (BranchKind::Remote, Some(reference)) => format!("{}@{}", self.name, reference),
            _ => self.name.clone(),
        }
    }
}

/// The installer's output document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeDocument {
    /// Records in build order
    pub branches: Vec<BranchRecord>,
}

/// Load a component tree file.
///
/// Relative record paths resolve against the tree file's directory. Remote
/// records without a path default to `<components_dir>/<owner>-<repo>-<ref>`.
pub fn load_tree(path: &Path, components_dir: &Path) -> Result<Vec<Arc<Branch>>, TreeError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| TreeError::Io { path: path.to_path_buf(), source })?;
    let document: TreeDocument = serde_json::from_str(&contents)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let components_dir = if components_dir.is_absolute() {
        components_dir.to_path_buf()
    } else {
        base.join(components_dir)
    };

    let records = document
        .branches
        .into_iter()
        .map(|mut record| {
            record.path = record.path.map(|p| if p.is_absolute() { p } else { base.join(p) });
            record
        })
        .collect();

    link_branches(records, &components_dir)
}

/// Link flat records into shared branches, preserving record order.
pub fn link_branches(
    records: Vec<BranchRecord>,
    components_dir: &Path,
) -> Result<Vec<Arc<Branch>>, TreeError> {
    let mut index = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        match record.kind {
            BranchKind::Remote if record.reference.is_none() => {
                return Err(TreeError::MissingRef(record.name.clone()));
            }
            BranchKind::Local if record.path.is_none() => {
                return Err(TreeError::MissingPath(record.name.clone()));
            }
            _ => {}
        }
        let canonical = record.canonical_name();
        if index.insert(canonical.clone(), i).is_some() {
            return Err(TreeError::Duplicate(canonical));
        }
    }

    let mut linker = Linker {
        records: &records,
        index: &index,
        components_dir,
        built: vec![None; records.len()],
        visiting: vec![false; records.len()],
    };
    (0..records.len()).map(|i| linker.link(i)).collect()
}

struct Linker<'a> {
    records: &'a [BranchRecord],
    index: &'a HashMap<String, usize>,
    components_dir: &'a Path,
    built: Vec<Option<Arc<Branch>>>,
    visiting: Vec<bool>,
}

impl<'a> Linker<'a> {
    fn link(&mut self, i: usize) -> Result<Arc<Branch>, TreeError> {
        if let Some(branch) = &self.built[i] {
            return Ok(Arc::clone(branch));
        }
        let record: &'a BranchRecord = &self.records[i];
        if self.visiting[i] {
            return Err(TreeError::Cycle(record.canonical_name()));
        }
        self.visiting[i] = true;

        let mut dependencies = BTreeMap::new();
        for (name, reference) in &record.dependencies {
            let canonical = format!("{}@{}", name, reference);
            let j = self.lookup(record, canonical)?;
            dependencies.insert(name.clone(), self.link(j)?);
        }

        let mut locals = BTreeMap::new();
        for name in &record.locals {
            let j = self.lookup(record, name.clone())?;
            locals.insert(name.clone(), self.link(j)?);
        }

        self.visiting[i] = false;

        let path = record.path.clone().unwrap_or_else(|| {
            let reference = record.reference.as_deref().unwrap_or_default();
            self.components_dir.join(format!("{}-{}", record.name.replace('/', "-"), reference))
        });

        let branch = Arc::new(Branch {
            name: record.name.clone(),
            reference: record.reference.clone(),
            kind: record.kind,
            path,
            manifest: record.manifest.clone(),
            dependencies,
            locals,
        });
        self.built[i] = Some(Arc::clone(&branch));
        Ok(branch)
    }

    fn lookup(&self, record: &BranchRecord, dependency: String) -> Result<usize, TreeError> {
        self.index.get(&dependency).copied().ok_or_else(|| TreeError::UnknownDependency {
            branch: record.canonical_name(),
            dependency,
        })
    }
}
