//! twine - Bundle a resolved component tree into one script bundle, one
//! stylesheet bundle and a directory of published assets.
//!
//! This library provides functionality to:
//! - Extract each branch's declared files per manifest field
//! - Run files through per-field middleware with bounded concurrency
//! - Rewrite `require` references to canonical module names
//! - Stream the wrapped output in a deterministic order

pub mod assemble;
pub mod build;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod plugins;
pub mod presets;
pub mod resolve;
pub mod tree;
pub mod watch;

pub use presets::{files, scripts, styles};
