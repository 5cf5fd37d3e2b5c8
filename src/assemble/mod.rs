//! Output assembly.
//!
//! Serializes processed files into bundle statements: module registrations
//! and literal definitions for scripts, URL-rewritten text for styles.
//! Statements are concatenated by the engine in dispatch order, each
//! followed by a blank line.

pub mod scripts;
pub mod styles;

pub use scripts::{
    alias, define, js_string_literal, register, register_annotated, source_map_annotation,
    source_url_annotation, statement, BOOTSTRAP,
};
pub use styles::{is_passthrough, rewrite_urls};
