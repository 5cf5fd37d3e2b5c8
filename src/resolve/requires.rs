//! Locating `require("...")` calls in script source.
//!
//! This is a textual scan, not a parse: calls inside comments or strings are
//! found too, and only literal string arguments are recognized.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// One literal `require` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireCall {
    /// Byte range of the whole call, `require(...)` inclusive
    pub span: Range<usize>,
    /// The string argument
    pub target: String,
}

fn require_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:^|[^.\w$])(require\s*\(\s*(?:"([^"\n]*)"|'([^'\n]*)')\s*\))"#)
            .expect("require pattern is a valid regex")
    })
}

/// Every literal `require` call in `source`, in order.
///
/// Calls reached through a member access (`foo.require(...)`) or as part of a
/// longer identifier (`myrequire(...)`) are skipped.
pub fn find_requires(source: &str) -> Vec<RequireCall> {
    require_pattern()
        .captures_iter(source)
        .filter_map(|caps| {
            let call = caps.get(1)?;
            let target = caps.get(2).or_else(|| caps.get(3))?;
            Some(RequireCall { span: call.range(), target: target.as_str().to_string() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(source: &str) -> Vec<String> {
        find_requires(source).into_iter().map(|c| c.target).collect()
    }

    #[test]
    fn test_finds_both_quote_styles() {
        let source = "var a = require('./a');\nvar b = require(\"emitter\");";
        assert_eq!(targets(source), vec!["./a", "emitter"]);
    }

    #[test]
    fn test_span_covers_call() {
        let source = "x = require( 'y' );";
        let calls = find_requires(source);
        assert_eq!(&source[calls[0].span.clone()], "require( 'y' )");
    }

    #[test]
    fn test_skips_member_and_identifier_calls() {
        let source = "a.require('x'); myrequire('y'); $require('z'); require('ok')";
        assert_eq!(targets(source), vec!["ok"]);
    }

    #[test]
    fn test_ignores_dynamic_arguments() {
        assert!(targets("require(name); require('a' + b)").is_empty());
    }

    #[test]
    fn test_start_of_input() {
        assert_eq!(targets("require('first')"), vec!["first"]);
    }
}
