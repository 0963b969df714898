//! Path policy for generated files.
//!
//! Every path that enters a [`FileCollection`](crate::types::FileCollection) or
//! reaches the sandbox goes through [`normalize_relative_path`], which rejects
//! anything that could escape the sandbox workspace or produce an empty tree
//! segment.

use crate::{Error, Result};

/// Separator used for all generated file paths.
pub const SEPARATOR: char = '/';

/// Validates a relative path and returns it in normalized form.
///
/// Rejected inputs:
/// 1. Empty or whitespace-only paths.
/// 2. Absolute paths (`/etc/passwd`, `C:\Windows`).
/// 3. Empty segments from leading, trailing or doubled separators.
/// 4. `.` and `..` segments.
/// 5. Backslashes and NUL bytes.
pub fn normalize_relative_path(input_path: &str) -> Result<String> {
    let path = input_path.trim();

    if path.is_empty() {
        return Err(Error::invalid_request("Path must not be empty"));
    }

    // Cross-platform check: reject Windows-style absolute paths on any OS
    if path.len() >= 2 && path.as_bytes()[1] == b':' && path.as_bytes()[0].is_ascii_alphabetic() {
        return Err(Error::invalid_request(format!(
            "Absolute paths are not allowed: {}",
            input_path
        )));
    }

    if path.starts_with(SEPARATOR) {
        return Err(Error::invalid_request(format!(
            "Absolute paths are not allowed: {}",
            input_path
        )));
    }

    if path.contains('\\') || path.contains('\0') {
        return Err(Error::invalid_request(format!(
            "Path contains forbidden characters: {}",
            input_path
        )));
    }

    for segment in path.split(SEPARATOR) {
        match segment {
            "" => {
                return Err(Error::invalid_request(format!(
                    "Path contains an empty segment: {}",
                    input_path
                )))
            }
            "." | ".." => {
                return Err(Error::invalid_request(format!(
                    "Path traversal detected in path: {}",
                    input_path
                )))
            }
            _ => {}
        }
    }

    Ok(path.to_string())
}

/// Splits an already-normalized path into its segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(normalize_relative_path("main.py").unwrap(), "main.py");
        assert_eq!(normalize_relative_path("src/app.js").unwrap(), "src/app.js");
        assert_eq!(
            normalize_relative_path("  app/page.tsx ").unwrap(),
            "app/page.tsx"
        );
    }

    #[test]
    fn test_empty_segment_rejection() {
        assert!(normalize_relative_path("").is_err());
        assert!(normalize_relative_path("   ").is_err());
        assert!(normalize_relative_path("src//app.js").is_err());
        assert!(normalize_relative_path("src/").is_err());
    }

    #[test]
    fn test_traversal_rejection() {
        let err = normalize_relative_path("../etc/passwd").unwrap_err();
        assert!(err.to_string().contains("Path traversal"));
        assert!(normalize_relative_path("src/../../etc/passwd").is_err());
        assert!(normalize_relative_path("./local.txt").is_err());
    }

    #[test]
    fn test_absolute_path_rejection() {
        let err = normalize_relative_path("/etc/passwd").unwrap_err();
        assert!(err.to_string().contains("Absolute paths"));
        assert!(normalize_relative_path("C:\\Windows\\System32").is_err());
        assert!(normalize_relative_path("src\\main.rs").is_err());
    }
}
