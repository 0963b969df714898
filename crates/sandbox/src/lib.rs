#![deny(unused)]
//! Isolated execution sandboxes for Sandforge jobs.
//!
//! Every command, file read and file write issued by the coding agent is
//! routed through a sandbox, so the host is never touched directly.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Controller (agent network)            │
//! │    ↓ ToolCall                          │
//! ├────────────────────────────────────────┤
//! │  ToolRegistry (run/write/read tools)   │
//! │    ↓ connect(sandbox_id)               │
//! ├────────────────────────────────────────┤
//! │  SandboxManager (per job)              │
//! │    ↓ SandboxEngine                     │
//! ├────────────────────────────────────────┤
//! │  DockerSandbox │ MockSandbox           │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sandforge_sandbox::{DockerSandbox, SandboxConfig, SandboxManager, ToolRegistry};
//!
//! let engine = Arc::new(DockerSandbox::new()?);
//! let manager = SandboxManager::new(engine, SandboxConfig::default());
//! let sandbox_id = manager.create("sandforge-nextjs:latest").await?;
//! let result = ToolRegistry::with_defaults().invoke(&ctx, &call).await?;
//! manager.destroy(&sandbox_id).await;
//! ```

pub mod docker;
pub mod engine;
pub mod manager;
pub mod mock;
pub mod tools;

pub use docker::DockerSandbox;
pub use engine::{
    ExecResult, NetworkProfile, OutputSink, OutputStream, SandboxConfig, SandboxEngine,
    SandboxHandle, SandboxId,
};
pub use manager::{SandboxManager, TeardownOutcome};
pub use mock::MockSandbox;
pub use tools::{
    ReadFilesTool, RunCommandTool, SandboxTool, ToolContext, ToolRegistry, WriteFilesTool,
};
