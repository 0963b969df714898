//! File tree construction for presentation.
//!
//! Turns the flat path→content map of a finished job into the nested shape a
//! file browser renders: a file is its bare name, a directory is a group whose
//! first element is the directory name followed by its children.
//!
//! ```text
//! {"src/index.ts": .., "README.md": ..}  →  ["README.md", ["src", "index.ts"]]
//! ```

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::fs_policy::{segments, SEPARATOR};
use crate::types::FileCollection;

/// One node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeItem {
    /// A file, rendered as its bare name.
    File(String),
    /// A directory, rendered as `[name, child...]`.
    Directory { name: String, children: Vec<TreeItem> },
}

impl TreeItem {
    /// Name of this file or directory.
    pub fn name(&self) -> &str {
        match self {
            Self::File(name) => name,
            Self::Directory { name, .. } => name,
        }
    }

    fn collect_paths(&self, parent: &str, out: &mut Vec<String>) {
        let current = if parent.is_empty() {
            self.name().to_string()
        } else {
            format!("{}{}{}", parent, SEPARATOR, self.name())
        };
        match self {
            Self::File(_) => out.push(current),
            Self::Directory { children, .. } => {
                for child in children {
                    child.collect_paths(&current, out);
                }
            }
        }
    }
}

/// Full paths of every file, joined depth-first in tree order.
pub fn flatten_paths(items: &[TreeItem]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        item.collect_paths("", &mut out);
    }
    out
}

// =============================================================================
// Builder
// =============================================================================

/// Prefix-tree node. Children keep first-insertion order; a node without
/// children is a file.
#[derive(Default)]
struct Node {
    children: Vec<(String, Node)>,
}

impl Node {
    fn child_mut(&mut self, name: &str) -> &mut Node {
        let idx = match self.children.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.children.push((name.to_string(), Node::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[idx].1
    }

    fn into_items(self) -> Vec<TreeItem> {
        self.children
            .into_iter()
            .map(|(name, node)| {
                if node.children.is_empty() {
                    TreeItem::File(name)
                } else {
                    TreeItem::Directory {
                        name,
                        children: node.into_items(),
                    }
                }
            })
            .collect()
    }
}

/// Build the presentation tree for a file collection.
pub fn build_tree(files: &FileCollection) -> Vec<TreeItem> {
    build_tree_from_paths(files.paths())
}

/// Build the presentation tree from well-formed relative paths.
///
/// Paths are sorted first, so the result does not depend on input order.
pub fn build_tree_from_paths<'a, I>(paths: I) -> Vec<TreeItem>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = paths.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut root = Node::default();
    for path in sorted {
        let mut current = &mut root;
        for part in segments(path) {
            current = current.child_mut(part);
        }
    }
    root.into_items()
}

// =============================================================================
// Wire format
// =============================================================================

impl Serialize for TreeItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::File(name) => serializer.serialize_str(name),
            Self::Directory { name, children } => {
                let mut seq = serializer.serialize_seq(Some(children.len() + 1))?;
                seq.serialize_element(name)?;
                for child in children {
                    seq.serialize_element(child)?;
                }
                seq.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Name(String),
    Group(Vec<RawItem>),
}

impl TryFrom<RawItem> for TreeItem {
    type Error = String;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        match raw {
            RawItem::Name(name) => Ok(TreeItem::File(name)),
            RawItem::Group(items) => {
                let mut iter = items.into_iter();
                let name = match iter.next() {
                    Some(RawItem::Name(name)) => name,
                    _ => return Err("directory group must start with its name".to_string()),
                };
                let children = iter.map(TreeItem::try_from).collect::<Result<Vec<_>, _>>()?;
                if children.is_empty() {
                    return Err(format!("directory '{}' has no children", name));
                }
                Ok(TreeItem::Directory { name, children })
            }
        }
    }
}

impl<'de> Deserialize<'de> for TreeItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawItem::deserialize(deserializer)?;
        TreeItem::try_from(raw).map_err(de::Error::custom)
    }
}
