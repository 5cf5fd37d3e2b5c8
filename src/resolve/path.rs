//! Branch-relative path arithmetic.

/// Whether `target` is a relative reference (`./` or `../`).
pub fn is_relative(target: &str) -> bool {
    target.starts_with("./") || target.starts_with("../")
}

/// Resolve `target` against the file at `from`, URL style.
///
/// Both paths are `/`-separated and relative to the branch root. `..` never
/// climbs above the root, and empty or `.` segments vanish, so the result
/// never carries a trailing `/`.
pub fn resolve_relative(from: &str, target: &str) -> String {
    let mut segments: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    // drop the file name
    if !from.is_empty() && !from.ends_with('/') {
        segments.pop();
    }

    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// `path` with a trailing `.<word>` extension removed.
pub fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) => {
            let ext = &path[file_start + dot + 1..];
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                &path[..file_start + dot]
            } else {
                path
            }
        }
        None => path,
    }
}
