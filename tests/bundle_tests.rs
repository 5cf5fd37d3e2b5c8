//! Bundle build integration tests
//!
//! Builds real component trees from temporary directories and checks the
//! assembled output:
//!
//! - Reference rewriting for local and remote branches
//! - Relative resolution priority and failure policy
//! - Stylesheet URL rewriting
//! - Determinism, ordering and bounded concurrency
//! - Artifact cleanup on failure

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use twine::build::{step_fn, BuildContext, BuildError, Builder, FileEntry, Scripts, Step};
use twine::config::{default_config, Concurrency};
use twine::tree::{load_tree, Branch, Manifest};

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a file under `dir`, parents included.
fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Production context without the loader preamble.
fn context(root: &Path) -> BuildContext {
    BuildContext::new(default_config(), root.to_path_buf()).with_bootstrap(false)
}

fn local(root: &Path, name: &str, scripts: &[&str]) -> Arc<Branch> {
    Arc::new(
        Branch::local(name, root.join(name))
            .with_manifest(Manifest::named(name).with_field("scripts", scripts.to_vec())),
    )
}

fn remote(dir: &Path, name: &str, reference: &str, scripts: &[&str]) -> Arc<Branch> {
    Arc::new(
        Branch::remote(name, reference, dir)
            .with_manifest(Manifest::named(name).with_field("scripts", scripts.to_vec())),
    )
}

/// Names passed to `require.register` / `require.define`, in order.
fn registered(out: &str) -> Vec<String> {
    let mut calls: Vec<_> = out
        .match_indices("require.register(\"")
        .chain(out.match_indices("require.define(\""))
        .collect();
    calls.sort_by_key(|(i, _)| *i);
    calls
        .into_iter()
        .map(|(i, m)| {
            let rest = &out[i + m.len()..];
            rest[..rest.find('"').unwrap()].to_string()
        })
        .collect()
}

/// Claims every file regardless of extension.
fn claim_all() -> Arc<dyn Step> {
    Arc::new(step_fn(|file: &mut FileEntry, _ctx: &BuildContext| {
        file.defer();
        Ok(())
    }))
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_local_branch_end_to_end() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "var util = require('./util');");
    write(temp.path(), "app/util.js", "module.exports = 1;");

    let branches = vec![local(temp.path(), "app", &["index.js", "util.js"])];
    let out = twine::scripts(branches, context(temp.path())).run().collect_string().await.unwrap();

    assert_eq!(
        out,
        "require.register(\"app\", function (exports, module) {\n\
         var util = require(\"app/util.js\");\n\
         });\n\n\
         require.register(\"app/util.js\", function (exports, module) {\n\
         module.exports = 1;\n\
         });\n\n"
    );
}

#[tokio::test]
async fn test_remote_branch_end_to_end() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("components/owner-repo-1.0.0");
    write(&dir, "index.js", "module.exports = require('./lib/helper');");
    write(&dir, "lib/helper.js", "module.exports = 'help';");

    let branches = vec![remote(&dir, "owner/repo", "1.0.0", &["index.js", "lib/helper.js"])];
    let out = twine::scripts(branches, context(temp.path())).run().collect_string().await.unwrap();

    assert_eq!(registered(&out), vec!["owner/repo@1.0.0", "owner/repo@1.0.0/lib/helper.js"]);
    assert!(out.contains("module.exports = require(\"owner/repo@1.0.0/lib/helper.js\");"));
}

#[tokio::test]
async fn test_tree_with_dependencies_and_locals() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "components/component-emitter-1.1.0/index.js",
        "module.exports = 'emitter';",
    );
    write(temp.path(), "lib/widgets/index.js", "module.exports = require('./button');");
    write(temp.path(), "lib/widgets/button.js", "module.exports = 'button';");
    write(
        temp.path(),
        "lib/app/index.js",
        concat!(
            "var Emitter = require('emitter');\n",
            "var button = require('widgets/button');\n",
            "var raw = require('process');"
        ),
    );
    let tree = write(
        temp.path(),
        "components.json",
        r#"{
            "branches": [
                {"name": "component/emitter", "ref": "1.1.0", "type": "remote",
                 "manifest": {"name": "emitter", "scripts": ["index.js"]}},
                {"name": "widgets", "type": "local", "path": "lib/widgets",
                 "manifest": {"name": "widgets", "scripts": ["*.js"]}},
                {"name": "app", "type": "local", "path": "lib/app",
                 "manifest": {"name": "app", "scripts": ["index.js"]},
                 "dependencies": {"component/emitter": "1.1.0"},
                 "locals": ["widgets"]}
            ]
        }"#,
    );

    let branches = load_tree(&tree, Path::new("components")).unwrap();
    let out = twine::scripts(branches, context(temp.path())).run().collect_string().await.unwrap();

    assert_eq!(
        registered(&out),
        vec!["component/emitter@1.1.0", "widgets/button.js", "widgets", "app"]
    );
    assert!(out.contains("var Emitter = require(\"component/emitter@1.1.0\");"));
    assert!(out.contains("var button = require(\"widgets/button.js\");"));
    assert!(out.contains("var raw = require('process');"));
}

#[tokio::test]
async fn test_local_references_are_registered() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "app/index.js",
        "require('./lib');\nrequire('./lib/a');\nrequire('./data');",
    );
    write(temp.path(), "app/lib/index.js", "require('./a');");
    write(temp.path(), "app/lib/a.js", "require('../data.json');");
    write(temp.path(), "app/data.json", "{\"ok\": true}");

    let files = ["index.js", "lib/index.js", "lib/a.js", "data.json"];
    let branches = vec![local(temp.path(), "app", &files)];
    let out = twine::scripts(branches, context(temp.path())).run().collect_string().await.unwrap();

    let names = registered(&out);
    for call in out.match_indices("require(\"") {
        let rest = &out[call.0 + call.1.len()..];
        let target = &rest[..rest.find('"').unwrap()];
        assert!(names.iter().any(|n| n == target), "dangling reference {}", target);
    }
    assert!(out.contains("require.define(\"app/data.json\", {\"ok\": true});"));
}

// ============================================================================
// Relative resolution
// ============================================================================

#[tokio::test]
async fn test_literal_path_wins_over_js_extension() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "require('./x');");
    write(temp.path(), "app/x", "literal");
    write(temp.path(), "app/x.js", "script");

    let branches = vec![local(temp.path(), "app", &["index.js", "x", "x.js"])];
    let mut builder = Builder::new(Scripts, branches, context(temp.path()));
    builder.use_step("scripts", claim_all());
    let out = builder.run().collect_string().await.unwrap();
    assert!(out.contains("require(\"app/x\");"));
}

#[tokio::test]
async fn test_js_extension_when_literal_missing() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "require('./x');");
    write(temp.path(), "app/x.js", "script");

    let branches = vec![local(temp.path(), "app", &["index.js", "x.js"])];
    let mut builder = Builder::new(Scripts, branches, context(temp.path()));
    builder.use_step("scripts", claim_all());
    let out = builder.run().collect_string().await.unwrap();
    assert!(out.contains("require(\"app/x.js\");"));
}

#[tokio::test]
async fn test_missing_reference_in_local_branch_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "require('./missing');");

    let branches = vec![local(temp.path(), "app", &["index.js"])];
    let err = twine::scripts(branches, context(temp.path()))
        .run()
        .collect_string()
        .await
        .unwrap_err();

    match &err {
        BuildError::Resolution { target, branch, file } => {
            assert_eq!(target, "./missing");
            assert_eq!(branch, "app");
            assert_eq!(file, "index.js");
        }
        other => panic!("expected resolution error, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("./missing") && message.contains("app"));
}

#[tokio::test]
async fn test_missing_reference_in_remote_branch_is_kept() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("components/owner-repo-1.0.0");
    write(&dir, "index.js", "require('./missing');");

    let branches = vec![remote(&dir, "owner/repo", "1.0.0", &["index.js"])];
    let out = twine::scripts(branches, context(temp.path())).run().collect_string().await.unwrap();
    assert!(out.contains("require('./missing');"));
}

#[tokio::test]
async fn test_missing_declared_file_is_read_error() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "");

    let branches = vec![local(temp.path(), "app", &["index.js", "gone.js"])];
    let err = twine::scripts(branches, context(temp.path()))
        .run()
        .collect_string()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Read { ref branch, ref path, .. } if branch == "app" && path == "gone.js"
    ));
}

// ============================================================================
// Styles
// ============================================================================

#[tokio::test]
async fn test_style_urls_rewritten() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("components/owner-icons-2.0.0");
    write(
        &dir,
        "icons.css",
        ".a { background: url(./img/a.png); }\n\
         .b { background: url(data:image/png;base64,AAA); }\n\
         .c { background: url(/abs/path.png); }",
    );
    let branch = Arc::new(
        Branch::remote("owner/icons", "2.0.0", &dir)
            .with_manifest(Manifest::named("icons").with_field("styles", vec!["icons.css"])),
    );

    let ctx = context(temp.path()).with_url_prefix("/assets/");
    let out = twine::styles(vec![branch], ctx).run().collect_string().await.unwrap();
    assert_eq!(
        out,
        ".a { background: url(\"/assets/owner/icons/2.0.0/img/a.png\"); }\n\
         .b { background: url(data:image/png;base64,AAA); }\n\
         .c { background: url(/abs/path.png); }\n\n"
    );
}

// ============================================================================
// Development output
// ============================================================================

#[tokio::test]
async fn test_development_annotations_and_alias() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "boot-app/index.js", "start();");
    let branch = Arc::new(
        Branch::local("boot-app", temp.path().join("boot-app"))
            .with_manifest(Manifest::named("Boot").with_field("scripts", vec!["index.js"])),
    );

    let ctx = context(temp.path()).with_development(true);
    let out = twine::scripts(vec![branch], ctx).run().collect_string().await.unwrap();

    assert!(out.starts_with("require.register(\"boot-app\", Function(\"exports, module\",\n"));
    assert!(out.contains("//# sourceURL=boot-app/index.js"));
    assert!(out.ends_with("require.alias(\"boot-app\", \"boot\");\n\n"));
}

#[tokio::test]
async fn test_development_fields_only_for_local_branches() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "");
    write(temp.path(), "app/test.js", "");
    let dir = temp.path().join("components/owner-repo-1.0.0");
    write(&dir, "index.js", "");
    write(&dir, "test.js", "");

    let manifest = |name: &str| {
        Manifest::named(name)
            .with_field("scripts", vec!["index.js"])
            .with_development_field("scripts", vec!["test.js"])
    };
    let branches = vec![
        Arc::new(Branch::remote("owner/repo", "1.0.0", &dir).with_manifest(manifest("repo"))),
        Arc::new(Branch::local("app", temp.path().join("app")).with_manifest(manifest("app"))),
    ];

    let ctx = context(temp.path())
        .with_development(true)
        .with_source_url(false)
        .with_aliases(false);
    let out = twine::scripts(branches, ctx).run().collect_string().await.unwrap();
    assert_eq!(registered(&out), vec!["owner/repo@1.0.0", "app", "app/test.js"]);
}

// ============================================================================
// Engine guarantees
// ============================================================================

/// Sleeps a per-file pseudo-random time before claiming the file.
struct Jitter;

#[async_trait]
impl Step for Jitter {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        let seed: u64 = file.path.bytes().map(u64::from).sum();
        tokio::time::sleep(Duration::from_millis(seed * 7919 % 23)).await;
        file.defer();
        Ok(())
    }
}

fn many_files(root: &Path, count: usize) -> (Arc<Branch>, Vec<String>) {
    let files: Vec<String> = (0..count).map(|i| format!("f{:02}.js", i)).collect();
    for (i, file) in files.iter().enumerate() {
        write(&root.join("app"), file, &format!("module.exports = {};", i));
    }
    let refs: Vec<&str> = files.iter().map(String::as_str).collect();
    (local(root, "app", &refs), files)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_order_survives_random_delays() {
    let temp = TempDir::new().unwrap();
    let (branch, files) = many_files(temp.path(), 30);

    let ctx = context(temp.path()).with_concurrency(Concurrency::Limited(8));
    let mut builder = Builder::new(Scripts, vec![branch], ctx);
    builder.use_step("scripts", Arc::new(Jitter));
    let out = builder.run().collect_string().await.unwrap();

    let expected: Vec<String> = std::iter::once("app".to_string())
        .chain(files.iter().skip(1).map(|f| format!("app/{}", f)))
        .collect();
    assert_eq!(registered(&out), expected);
}

#[tokio::test]
async fn test_builds_are_deterministic() {
    let temp = TempDir::new().unwrap();
    let (branch, _) = many_files(temp.path(), 12);

    let build = || {
        let mut builder = Builder::new(Scripts, vec![Arc::clone(&branch)], context(temp.path()));
        builder.use_step("scripts", Arc::new(Jitter));
        builder.run().collect_bytes()
    };
    let first = build().await.unwrap();
    let second = build().await.unwrap();
    assert_eq!(first, second);
}

/// Tracks how many applications overlap.
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Step for Gauge {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let index: u64 = file.path[1..3].parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(40 - index * 5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        file.defer();
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_is_respected() {
    let temp = TempDir::new().unwrap();
    let (branch, files) = many_files(temp.path(), 5);
    let gauge = Arc::new(Gauge { current: AtomicUsize::new(0), peak: AtomicUsize::new(0) });

    let ctx = context(temp.path()).with_concurrency(Concurrency::Limited(2));
    let mut builder = Builder::new(Scripts, vec![branch], ctx);
    builder.use_step("scripts", gauge.clone());
    let out = builder.run().collect_string().await.unwrap();

    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    let expected: Vec<String> = std::iter::once("app".to_string())
        .chain(files.iter().skip(1).map(|f| format!("app/{}", f)))
        .collect();
    assert_eq!(registered(&out), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unbounded_concurrency_overlaps_everything() {
    let temp = TempDir::new().unwrap();
    let (branch, _) = many_files(temp.path(), 5);
    let gauge = Arc::new(Gauge { current: AtomicUsize::new(0), peak: AtomicUsize::new(0) });

    let ctx = context(temp.path()).with_concurrency(Concurrency::Unbounded);
    let mut builder = Builder::new(Scripts, vec![branch], ctx);
    builder.use_step("scripts", gauge.clone());
    builder.run().collect_string().await.unwrap();

    assert!(gauge.peak.load(Ordering::SeqCst) > 2);
}

// ============================================================================
// Artifact output
// ============================================================================

#[tokio::test]
async fn test_write_to_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "go();");
    let out = temp.path().join("build/build.js");

    let branches = vec![local(temp.path(), "app", &["index.js"])];
    let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
    let written = twine::scripts(branches, ctx).run().write_to_file(&out).await.unwrap();

    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(written as usize, content.len());
    assert!(content.contains("function require(name)"));
    assert!(content.ends_with(
        "require.register(\"app\", function (exports, module) {\ngo();\n});\n\n"
    ));
}

#[tokio::test]
async fn test_failed_build_leaves_no_artifact() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "app/index.js", "ok();");
    write(temp.path(), "app/b.js", "require('./nope');");
    let out = write(temp.path(), "build/build.js", "previous build");

    let branches = vec![local(temp.path(), "app", &["index.js", "b.js"])];
    let result = twine::scripts(branches, context(temp.path())).run().write_to_file(&out).await;

    assert!(matches!(result, Err(BuildError::Resolution { .. })));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_files_are_published() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("components/owner-fonts-1.0.0");
    write(&dir, "fonts/a.woff", "woff");
    let branch = Arc::new(
        Branch::remote("owner/fonts", "1.0.0", &dir)
            .with_manifest(Manifest::named("fonts").with_field("fonts", vec!["fonts/*.woff"])),
    );

    let out = twine::files(vec![branch], context(temp.path()))
        .run()
        .collect_string()
        .await
        .unwrap();
    assert!(out.is_empty());
    let published = temp.path().join("build/owner/fonts/1.0.0/fonts/a.woff");
    assert_eq!(fs::read_to_string(published).unwrap(), "woff");
}
