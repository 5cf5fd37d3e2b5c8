//! Built-in middleware steps.
//!
//! Script fields use [`js`], [`json`] and [`string`]; style fields use
//! [`css`]; asset fields use [`copy`] or [`symlink`]. [`default_steps`] maps
//! a field name to the steps `twine build` registers for it.

mod assets;

pub use assets::{copy, symlink, Publish, PublishMode};

use async_trait::async_trait;
use std::sync::Arc;

use crate::assemble::js_string_literal;
use crate::build::{BuildContext, BuildError, FileEntry, Step};

/// Claims files with one extension, reading them later.
#[derive(Debug, Clone)]
pub struct Defer {
    extension: &'static str,
}

#[async_trait]
impl Step for Defer {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        if file.extension == self.extension {
            file.defer();
        }
        Ok(())
    }
}

/// Include `.js` files as modules.
pub fn js() -> Defer {
    Defer { extension: "js" }
}

/// Include `.css` files.
pub fn css() -> Defer {
    Defer { extension: "css" }
}

/// Validates `.json` files and defines them as literals.
#[derive(Debug, Clone, Default)]
pub struct Json;

#[async_trait]
impl Step for Json {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        if file.extension != "json" {
            return Ok(());
        }
        file.load().await?;
        let text = file.text().unwrap_or_default();
        if let Err(err) = serde_json::from_str::<serde_json::Value>(text) {
            return Err(BuildError::Validation {
                filename: file.filename.clone(),
                message: format!("invalid JSON: {}", err),
            });
        }
        file.define = true;
        Ok(())
    }
}

pub fn json() -> Json {
    Json
}

/// Defines any file's text as a string literal.
#[derive(Debug, Clone, Default)]
pub struct StringLiteral;

#[async_trait]
impl Step for StringLiteral {
    async fn apply(&self, file: &mut FileEntry, _ctx: &BuildContext) -> Result<(), BuildError> {
        // an earlier step already produced content
        if file.is_loaded() {
            return Ok(());
        }
        file.load().await?;
        let literal = js_string_literal(file.text().unwrap_or_default());
        file.set_text(literal);
        file.define = true;
        Ok(())
    }
}

pub fn string() -> StringLiteral {
    StringLiteral
}

/// Steps `twine build` registers for `field`.
///
/// Unknown script fields are treated as templates.
pub fn default_steps(field: &str) -> Vec<Arc<dyn Step>> {
    match field {
        "scripts" => vec![Arc::new(js()), Arc::new(json())],
        "json" => vec![Arc::new(json())],
        "styles" => vec![Arc::new(css())],
        _ => vec![Arc::new(string())],
    }
}
