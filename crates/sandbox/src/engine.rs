//! Sandbox execution engine contract.
//!
//! A [`SandboxEngine`] provisions, resolves and destroys sandboxes addressed by
//! an opaque [`SandboxId`]. A resolved [`SandboxHandle`] runs commands with
//! streamed output and reads/writes files inside the sandbox workspace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use sandforge_core::config::SandboxSettings;
use sandforge_core::Result;

// =============================================================================
// Sandbox Types
// =============================================================================

/// Unique identifier for a sandbox instance.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SandboxId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Network isolation profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkProfile {
    /// No network access (default).
    None,
    /// Full access to host network (dangerous).
    Host,
    /// Bridge network (standard Docker networking).
    Bridge,
    /// Custom network name.
    Custom(String),
}

impl NetworkProfile {
    fn parse(name: &str) -> Self {
        match name {
            "none" | "" => Self::None,
            "host" => Self::Host,
            "bridge" => Self::Bridge,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Configuration for creating a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Template (container image) the sandbox is created from.
    pub template: String,
    /// Maximum memory in bytes.
    pub memory_limit: i64,
    /// CPU period/quota (default: 1 core equivalent).
    pub cpu_quota: i64,
    /// Network isolation profile.
    pub network_profile: NetworkProfile,
    /// Working directory inside the sandbox.
    pub workdir: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::from_settings("sandforge-nextjs:latest", &SandboxSettings::default())
    }
}

impl SandboxConfig {
    /// Build a sandbox config from application settings.
    pub fn from_settings(template: &str, settings: &SandboxSettings) -> Self {
        Self {
            template: template.to_string(),
            memory_limit: settings.memory_limit_bytes,
            cpu_quota: settings.cpu_quota,
            network_profile: NetworkProfile::parse(&settings.network),
            workdir: settings.workdir.clone(),
        }
    }

    /// Same config, different template.
    pub fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }
}

/// Which stream an output chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Callback receiving output chunks as they arrive.
pub type OutputSink<'a> = &'a mut (dyn FnMut(OutputStream, &str) + Send);

/// Result of executing a command in the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    /// Exit code of the command.
    pub exit_code: i64,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the command timed out.
    pub timed_out: bool,
}

impl ExecResult {
    /// Whether the execution was successful (exit code 0, no timeout).
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

// =============================================================================
// Engine Traits
// =============================================================================

/// Trait for sandbox execution backends.
///
/// Implementations provide isolated environments for running untrusted code.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Provision a new sandbox.
    async fn create(&self, config: &SandboxConfig) -> Result<SandboxId>;

    /// Resolve an existing sandbox to a live handle.
    async fn connect(&self, id: &SandboxId) -> Result<Arc<dyn SandboxHandle>>;

    /// Destroy the sandbox and clean up resources.
    async fn destroy(&self, id: &SandboxId) -> Result<()>;

    /// Check if the sandbox backend is available (e.g., Docker daemon running).
    async fn is_available(&self) -> bool;
}

/// A live connection to one sandbox.
#[async_trait]
pub trait SandboxHandle: Send + Sync {
    /// The sandbox this handle is connected to.
    fn id(&self) -> &SandboxId;

    /// Execute a shell command, passing output chunks to `on_output` as they
    /// arrive.
    async fn run(
        &self,
        command: &str,
        timeout: Duration,
        on_output: OutputSink<'_>,
    ) -> Result<ExecResult>;

    /// Write a file at `path` (relative to the workdir), creating parent
    /// directories.
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Read a file at `path` (relative to the workdir).
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}
