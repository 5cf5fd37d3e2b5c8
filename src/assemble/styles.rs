//! Stylesheet URL rewriting.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::resolve::resolve_relative;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\burl *\(([^)]*)\)").expect("url pattern is a valid regex"))
}

/// Whether a URL must be left as written.
pub fn is_passthrough(uri: &str) -> bool {
    uri.is_empty()
        || uri.starts_with("data:")
        || uri.starts_with('/')
        || uri.starts_with('#')
        || uri.contains("://")
}

/// Rewrite every relative `url(...)` in `css`.
///
/// `path` is the stylesheet's path inside its branch and `folder` the
/// branch's asset folder. Relative references become
/// `url("<prefix><folder>/<resolved path>")`.
pub fn rewrite_urls(css: &str, prefix: &str, folder: &str, path: &str) -> String {
    url_pattern()
        .replace_all(css, |caps: &Captures| {
            let raw = caps[1].trim();
            let uri = unquote(raw);
            if is_passthrough(uri) {
                return caps[0].to_string();
            }
            let resolved = resolve_relative(path, uri);
            format!("url(\"{}{}/{}\")", prefix, folder, resolved)
        })
        .into_owned()
}

fn unquote(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}
