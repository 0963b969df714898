use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::fs_policy::{normalize_relative_path, SEPARATOR};
use crate::{Error, Result};

// =============================================================================
// File Collection
// =============================================================================

/// Generated files keyed by normalized relative path.
///
/// Mutation is additive only: writing an existing path overwrites that entry,
/// nothing is ever removed. Keys are kept sorted so that serialization and
/// iteration are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileCollection {
    entries: BTreeMap<String, String>,
}

impl FileCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from `(path, content)` pairs, validating every path.
    pub fn from_entries<I, P, C>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut collection = Self::new();
        for (path, content) in entries {
            collection.insert(path.as_ref(), content)?;
        }
        Ok(collection)
    }

    /// Insert or overwrite a file. Returns the normalized key.
    ///
    /// Fails when the path is malformed or when it would turn an existing
    /// file into a directory (or the reverse), e.g. `a` next to `a/b`.
    pub fn insert(&mut self, path: &str, content: impl Into<String>) -> Result<String> {
        let key = normalize_relative_path(path)?;
        self.check_conflicts(&key)?;
        self.entries.insert(key.clone(), content.into());
        Ok(key)
    }

    fn check_conflicts(&self, key: &str) -> Result<()> {
        // An ancestor of `key` is already a file.
        let mut prefix_end = 0;
        while let Some(offset) = key[prefix_end..].find(SEPARATOR) {
            let ancestor = &key[..prefix_end + offset];
            if self.entries.contains_key(ancestor) {
                return Err(Error::invalid_request(format!(
                    "Path '{}' conflicts with existing file '{}'",
                    key, ancestor
                )));
            }
            prefix_end += offset + 1;
        }

        // `key` is already used as a directory.
        let dir_prefix = format!("{}{}", key, SEPARATOR);
        if let Some((existing, _)) = self.entries.range(dir_prefix.clone()..).next() {
            if existing.starts_with(&dir_prefix) {
                return Err(Error::invalid_request(format!(
                    "Path '{}' conflicts with existing directory containing '{}'",
                    key, existing
                )));
            }
        }

        Ok(())
    }

    /// Get the content stored at a path.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Whether a path is present.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterate over `(path, content)` in lexicographic path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        FileCollection::from_entries(raw).map_err(serde::de::Error::custom)
    }
}

/// A single file to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the sandbox workspace.
    pub path: String,
    /// Full file content.
    pub content: String,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}
