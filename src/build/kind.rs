//! Bundle kinds.
//!
//! A [`BundleKind`] decides which branches are dispatched, prepares their
//! files and serializes each processed file. The engine is generic over the
//! kind; [`Scripts`], [`Styles`] and [`Files`] are the built-in ones.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::BuildContext;
use super::engine::BuildEnv;
use super::error::BuildError;
use super::extract::BranchManifest;
use super::file::FileEntry;
use crate::assemble;
use crate::resolve::Resolver;
use crate::tree::Branch;

/// Module names claimed during one build.
///
/// Seeded with every branch's canonical name so aliases never shadow a real
/// branch.
#[derive(Debug, Default)]
pub struct NameRegistry {
    branches: HashSet<String>,
    taken: HashSet<String>,
}

impl NameRegistry {
    /// Registry seeded with every branch reachable from `branches`.
    pub fn seeded(branches: &[Arc<Branch>]) -> Self {
        let mut registry = Self::default();
        let mut stack: Vec<&Arc<Branch>> = branches.iter().collect();
        while let Some(branch) = stack.pop() {
            if registry.branches.insert(branch.canonical_name()) {
                stack.extend(branch.dependencies.values());
                stack.extend(branch.locals.values());
            }
        }
        registry
    }

    /// Claim a module name; `false` when it was already claimed.
    pub fn claim(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_string())
    }

    /// Claim an alias; `false` when it collides with a branch or a claimed name.
    pub fn claim_alias(&mut self, alias: &str) -> bool {
        !self.branches.contains(alias) && self.claim(alias)
    }
}

/// How one kind of bundle treats branches and files.
#[async_trait]
pub trait BundleKind: Send + Sync + 'static {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Whether `manifest`'s files are dispatched at all.
    fn resolve_branch(&self, manifest: &BranchManifest) -> bool {
        !manifest.is_empty()
    }

    /// Adjust a dispatched branch's files before they become tasks.
    fn prepare(&self, _entries: &mut [FileEntry], _names: &mut NameRegistry, _ctx: &BuildContext) {}

    /// Text emitted once before any statement.
    fn preamble(&self, _ctx: &BuildContext) -> Option<String> {
        None
    }

    /// Serialize one processed file, separator included.
    fn wrap_file(&self, file: &FileEntry, ctx: &BuildContext) -> String;

    /// Terminal step run after the field's middleware.
    ///
    /// Unclaimed files produce nothing; deferred files are read first.
    async fn append(
        &self,
        mut file: FileEntry,
        env: &BuildEnv,
    ) -> Result<Option<String>, BuildError> {
        if !file.content.is_set() {
            return Ok(None);
        }
        file.load().await?;
        Ok(Some(self.wrap_file(&file, &env.context)))
    }
}

/// Script bundles: one `require.register` or `require.define` per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scripts;

#[async_trait]
impl BundleKind for Scripts {
    fn label(&self) -> &'static str {
        "scripts"
    }

    fn prepare(&self, entries: &mut [FileEntry], names: &mut NameRegistry, ctx: &BuildContext) {
        for entry in entries.iter() {
            if !names.claim(&entry.name) {
                warn!(name = %entry.name, "module name registered more than once");
            }
        }

        if !ctx.aliases() {
            return;
        }
        let Some(main) = entries.iter_mut().find(|e| e.is_main()) else {
            return;
        };
        if !main.branch().is_local() {
            return;
        }
        let alias = main.branch().manifest.name.to_lowercase();
        if alias.is_empty() || alias == main.name {
            return;
        }
        if names.claim_alias(&alias) {
            debug!(name = %main.name, alias = %alias, "registering alias");
            main.alias = Some(alias);
        }
    }

    fn preamble(&self, ctx: &BuildContext) -> Option<String> {
        ctx.bootstrap().then(|| format!("{}\n\n", assemble::BOOTSTRAP.trim_end()))
    }

    fn wrap_file(&self, file: &FileEntry, ctx: &BuildContext) -> String {
        assemble::statement(file, ctx)
    }

    async fn append(
        &self,
        mut file: FileEntry,
        env: &BuildEnv,
    ) -> Result<Option<String>, BuildError> {
        if !file.content.is_set() {
            return Ok(None);
        }
        file.load().await?;
        if !file.define {
            let resolver = Resolver::new(&env.extractor);
            let rewritten = resolver.rewrite(&file, file.text().unwrap_or_default()).await?;
            file.set_text(rewritten);
        }
        Ok(Some(self.wrap_file(&file, &env.context)))
    }
}

/// Style bundles: file text with relative `url(...)` references rewritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct Styles;

#[async_trait]
impl BundleKind for Styles {
    fn label(&self) -> &'static str {
        "styles"
    }

    fn wrap_file(&self, file: &FileEntry, ctx: &BuildContext) -> String {
        let text = file.text().unwrap_or_default();
        let folder = file.branch().asset_folder();
        let mut out = assemble::rewrite_urls(text, ctx.url_prefix(), &folder, &file.path);
        out.push_str("\n\n");
        out
    }
}

/// Asset files: the middleware publishes them; nothing is emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Files;

#[async_trait]
impl BundleKind for Files {
    fn label(&self) -> &'static str {
        "files"
    }

    fn wrap_file(&self, _file: &FileEntry, _ctx: &BuildContext) -> String {
        String::new()
    }

    async fn append(
        &self,
        _file: FileEntry,
        _env: &BuildEnv,
    ) -> Result<Option<String>, BuildError> {
        Ok(None)
    }
}
