//! Module reference resolution.
//!
//! Maps the string argument of a `require` call, as written inside one
//! branch's file, to the canonical name the target is registered under in
//! the same bundle.
//!
//! # Relative references
//!
//! `./x` and `../x` resolve against the requiring file's path and are matched
//! against the owning branch's files, trying in order: the literal path,
//! `.js`, `.json`, `/index.js`, then any file whose path minus its extension
//! equals the target.
//!
//! # Bare references
//!
//! `reference[/tail]` is tried against the branch's dependencies and locals:
//! `owner~repo`, `owner-repo`, a local name (or prefix), the repo segment,
//! then a dependency's declared manifest name. A tail resolves inside the
//! matched branch.

pub mod path;
pub mod requires;

use std::sync::Arc;
use tracing::debug;

use crate::build::{BranchManifest, BuildError, FieldExtractor, FileEntry};
use crate::tree::Branch;

pub use path::{is_relative, resolve_relative, strip_extension};
pub use requires::{find_requires, RequireCall};

/// Suffixes tried, in order, when matching a relative reference.
const EXTENSIONS: [&str; 4] = ["", ".js", ".json", "/index.js"];

/// Resolves references for one build.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    extractor: &'a FieldExtractor,
}

impl<'a> Resolver<'a> {
    /// Create a resolver backed by the build's extractor.
    pub fn new(extractor: &'a FieldExtractor) -> Self {
        Self { extractor }
    }

    /// Resolve `target` as written in `file`.
    ///
    /// `Ok(None)` means the reference stays as written. A relative reference
    /// that matches nothing is an error only inside local branches.
    pub async fn lookup(
        &self,
        file: &FileEntry,
        target: &str,
    ) -> Result<Option<String>, BuildError> {
        if !is_relative(target) {
            return self.lookup_dependency(file.branch(), target).await;
        }

        if let Some(name) = lookup_relative(&file.manifest, &file.path, target) {
            return Ok(Some(name));
        }

        let branch = file.branch();
        if branch.is_local() {
            return Err(BuildError::Resolution {
                target: target.to_string(),
                branch: branch.canonical_name(),
                file: file.path.clone(),
            });
        }
        debug!(
            reference = target,
            branch = %branch.canonical_name(),
            file = %file.path,
            "ignoring unresolved relative reference"
        );
        Ok(None)
    }

    /// Resolve a bare reference against `branch`'s dependencies and locals.
    pub async fn lookup_dependency(
        &self,
        branch: &Branch,
        target: &str,
    ) -> Result<Option<String>, BuildError> {
        let (reference, tail) = match target.find('/') {
            Some(i) => target.split_at(i),
            None => (target, ""),
        };
        let deps = &branch.dependencies;

        // <owner>~<repo>
        if reference.contains('~') {
            if let Some(dep) = deps.get(&reference.replacen('~', "/", 1)) {
                return self.within(dep, tail).await.map(Some);
            }
        }

        // <owner>-<repo>
        if reference.contains('-') {
            let dashed = deps.iter().find(|(key, _)| key.replacen('/', "-", 1) == reference);
            if let Some((_, dep)) = dashed {
                return self.within(dep, tail).await.map(Some);
            }
        }

        // local submodule, whole target or prefix
        for (name, local) in &branch.locals {
            if let Some(rest) = target.strip_prefix(name.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return self.within(local, rest).await.map(Some);
                }
            }
        }

        // <repo>
        if let Some((_, dep)) = deps.iter().find(|(key, _)| repo_segment(key) == Some(reference)) {
            return self.within(dep, tail).await.map(Some);
        }

        // declared manifest name, when it differs from the repo
        let wanted = reference.to_lowercase();
        if let Some(dep) = deps
            .iter()
            .find(|(key, dep)| {
                let declared = dep.manifest.name.to_lowercase();
                !declared.is_empty()
                    && repo_segment(key) != Some(dep.manifest.name.as_str())
                    && declared == wanted
            })
            .map(|(_, d)| d)
        {
            return self.within(dep, tail).await.map(Some);
        }

        debug!(
            reference = target,
            branch = %branch.canonical_name(),
            "could not resolve reference"
        );
        Ok(None)
    }

    /// Canonical name of `tail` inside `branch`, or of the branch itself.
    ///
    /// A tail that matches none of the branch's files falls back to plain
    /// concatenation.
    async fn within(&self, branch: &Arc<Branch>, tail: &str) -> Result<String, BuildError> {
        let canonical = branch.canonical_name();
        if tail.is_empty() || tail == "/" {
            return Ok(canonical);
        }

        let manifest = self.extractor.manifest(branch).await?;
        let relative = format!(".{}", tail);
        match lookup_relative(&manifest, "", &relative) {
            Some(name) => Ok(name),
            None => {
                debug!(branch = %canonical, tail, "nested lookup failed, concatenating");
                Ok(format!("{}{}", canonical, tail))
            }
        }
    }

    /// Rewrite every resolvable `require` call in `source`.
    pub async fn rewrite(&self, file: &FileEntry, source: &str) -> Result<String, BuildError> {
        let calls = find_requires(source);
        if calls.is_empty() {
            return Ok(source.to_string());
        }

        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        for call in calls {
            out.push_str(&source[last..call.span.start]);
            match self.lookup(file, &call.target).await? {
                Some(name) => {
                    out.push_str("require(\"");
                    out.push_str(&name);
                    out.push_str("\")");
                }
                None => out.push_str(&source[call.span.clone()]),
            }
            last = call.span.end;
        }
        out.push_str(&source[last..]);
        Ok(out)
    }
}

/// Match a relative reference against `manifest`'s files.
///
/// `from` is the requiring file's path; pass `""` to resolve from the root.
pub fn lookup_relative(manifest: &BranchManifest, from: &str, target: &str) -> Option<String> {
    let path = resolve_relative(from, target);

    for ext in EXTENSIONS {
        let candidate = if path.is_empty() {
            ext.trim_start_matches('/').to_string()
        } else {
            format!("{}{}", path, ext)
        };
        if candidate.is_empty() {
            continue;
        }
        if let Some(file) = manifest.file(&candidate) {
            return Some(file.name.clone());
        }
    }

    manifest.files.iter().find(|f| strip_extension(&f.path) == path).map(|f| f.name.clone())
}

fn repo_segment(key: &str) -> Option<&str> {
    key.split('/').nth(1)
}
