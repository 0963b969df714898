//! Core type definitions for Sandforge.
//!
//! This module contains the data model shared by the sandbox, the tool layer
//! and the job engine.

pub mod agent;
pub mod files;
pub mod job;
pub mod reasoning;
pub mod tool;

pub use agent::*;
pub use files::*;
pub use job::*;
pub use reasoning::*;
pub use tool::*;
