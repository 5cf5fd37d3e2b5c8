//! Script statement serialization.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::build::{BuildContext, FileEntry};

/// The module loader emitted at the top of script bundles.
pub const BOOTSTRAP: &str = include_str!("require.js");

/// `require.register` with a literal function body.
pub fn register(name: &str, js: &str) -> String {
    format!("require.register(\"{}\", function (exports, module) {{\n{}\n}});", name, js)
}

/// `require.register` with the body passed as a string to `Function`, so
/// debuggers attribute it to the annotated source.
pub fn register_annotated(name: &str, js: &str, annotation: &str) -> String {
    let literal = js_string_literal(&format!("{}{}", js, annotation));
    // keep one source line per output line
    let literal = literal.replace("\\n", "\\n\\\n");
    format!("require.register(\"{}\", Function(\"exports, module\",\n{}\n));", name, literal)
}

/// `require.define` with a pre-evaluated literal.
pub fn define(name: &str, literal: &str) -> String {
    format!("require.define(\"{}\", {});", name, literal)
}

/// `require.alias` making `canonical` reachable as `alias`.
pub fn alias(canonical: &str, alias: &str) -> String {
    format!("require.alias(\"{}\", \"{}\");", canonical, alias)
}

/// Trailing comment embedding a source map.
pub fn source_map_annotation(map: &str) -> String {
    format!(
        "\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}",
        STANDARD.encode(map)
    )
}

/// Trailing comment naming the source path.
pub fn source_url_annotation(path: &str) -> String {
    format!("\n//# sourceURL={}", path)
}

/// `text` as a double-quoted JavaScript string literal.
pub fn js_string_literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Development annotation for `file`, if any.
///
/// A source map wins when embedding is enabled and the file carries one;
/// otherwise the source path is used.
fn annotation(file: &FileEntry, ctx: &BuildContext) -> Option<String> {
    if !ctx.source_map() && !ctx.source_url() {
        return None;
    }
    match (&file.source_map, ctx.source_map()) {
        (Some(map), true) => Some(source_map_annotation(map)),
        _ => Some(source_url_annotation(&ctx.display_path(&file.filename))),
    }
}

/// The full bundle statement for a processed file, separator included.
pub fn statement(file: &FileEntry, ctx: &BuildContext) -> String {
    let text = file.text().unwrap_or_default();
    let mut out = if file.define {
        define(&file.name, text)
    } else {
        match annotation(file, ctx) {
            Some(annotation) => register_annotated(&file.name, text, &annotation),
            None => register(&file.name, text),
        }
    };

    if let Some(alias_name) = &file.alias {
        out.push('\n');
        out.push_str(&alias(&file.name, alias_name));
    }
    out.push_str("\n\n");
    out
}
