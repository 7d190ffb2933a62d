//! Validation and composition of storage keys.

use crate::error::{StorageError, StorageResult};

/// A key or session id used as one path segment.
pub fn validate_segment(kind: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{} must not be empty", kind)));
    }
    if value == "." || value.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "{} contains path traversal",
            kind
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidKey(format!(
            "{} contains invalid characters",
            kind
        )));
    }
    Ok(())
}

/// Relative key of a published file: `{prefix}/{filename}`.
pub fn published_key(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix, filename)
}

/// Key of a file stored next to `key` (same directory).
pub fn sibling_key(key: &str, name: &str) -> String {
    match key.rsplit_once('/') {
        Some((dir, _)) => format!("{}/{}", dir, name),
        None => name.to_string(),
    }
}
