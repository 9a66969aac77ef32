//! Store path helpers.
//!
//! Store paths are absolute, `/`-separated and never end with a separator
//! (except the root `/` itself).

use crate::error::StoreError;

/// Path separator used by the store.
pub const SEPARATOR: char = '/';

/// Normalizes a path: adds a leading separator, collapses repeated
/// separators and drops a trailing separator.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Joins `child` beneath `base` as new segment(s) and normalizes the result.
///
/// ```
/// use coordconf_store::path::join;
///
/// assert_eq!(join("/config", "app"), "/config/app");
/// assert_eq!(join("/config/", "/db"), "/config/db");
/// assert_eq!(join("/", "app"), "/app");
/// ```
pub fn join(base: &str, child: &str) -> String {
    normalize(&format!("{base}{SEPARATOR}{child}"))
}

/// Returns the parent of `path`, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the last segment of `path` (empty for the root).
pub fn name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or_default()
}

/// Validates that `path` is an absolute, already-normalized store path.
pub fn validate(path: &str) -> Result<(), StoreError> {
    if !path.starts_with(SEPARATOR) {
        return Err(StoreError::invalid_path(path, "must start with '/'"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with(SEPARATOR) {
        return Err(StoreError::invalid_path(path, "must not end with '/'"));
    }
    if path.contains('\0') {
        return Err(StoreError::invalid_path(path, "must not contain NUL"));
    }
    for segment in path[1..].split(SEPARATOR) {
        match segment {
            "" => return Err(StoreError::invalid_path(path, "empty segment")),
            "." | ".." => {
                return Err(StoreError::invalid_path(
                    path,
                    "relative segments are not allowed",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
