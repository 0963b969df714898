#![deny(unused)]
//! Core types, traits, and error definitions for Sandforge.
//!
//! This crate provides the data model, collaborator traits, configuration and
//! the presentation tree builder shared by the sandbox and controller crates.

pub mod config;
pub mod error;
pub mod events;
pub mod fs_policy;
pub mod mocks;
pub mod traits;
pub mod tree;
pub mod types;

pub use error::{Error, Result};
pub use events::*;
pub use traits::*;
pub use tree::{build_tree, flatten_paths, TreeItem};
pub use types::*;
