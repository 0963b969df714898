//! Sandbox tools callable by the coding agent.
//!
//! Every tool validates its input up front and reports execution failures as
//! data inside a [`ToolInvocationResult`]. Only malformed input is returned as
//! an error, before the sandbox is touched.

use async_trait::async_trait;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sandforge_core::{
    CommandResult, Error, FileCollection, ReadResult, Result, ToolCall, ToolDefinition,
    ToolInvocationResult, WriteResult,
};

use crate::engine::{OutputStream, SandboxId};
use crate::manager::SandboxManager;

/// Everything a tool needs to act on the current job's sandbox.
pub struct ToolContext<'a> {
    pub manager: &'a SandboxManager,
    pub sandbox_id: &'a SandboxId,
    /// Files accumulated by the job so far.
    pub files: &'a FileCollection,
    pub command_timeout: Duration,
}

/// A tool operating on a sandbox.
#[async_trait]
pub trait SandboxTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. Execution failures are data; `Err` means invalid input.
    async fn invoke(&self, ctx: &ToolContext<'_>, args: Value) -> Result<ToolInvocationResult>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| Error::invalid_request(format!("Invalid arguments for {}: {}", tool, e)))
}

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

// =============================================================================
// Run Command
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunCommandArgs {
    /// Shell command to execute in the sandbox workspace.
    pub command: String,
}

/// Executes a shell command and captures its output.
pub struct RunCommandTool;

#[async_trait]
impl SandboxTool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command inside the sandbox. Returns stdout, stderr and the exit code."
    }

    fn parameters(&self) -> Value {
        schema_of::<RunCommandArgs>()
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, args: Value) -> Result<ToolInvocationResult> {
        let args: RunCommandArgs = parse_args(self.name(), args)?;
        let command = args.command.trim();
        if command.is_empty() {
            return Err(Error::invalid_request("Command cannot be empty"));
        }

        let mut stdout = String::new();
        let mut stderr = String::new();

        let handle = match ctx.manager.connect(ctx.sandbox_id).await {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(ToolInvocationResult::Command(CommandResult {
                    success: false,
                    stdout,
                    stderr,
                    exit_code: -1,
                    error: Some(e.to_string()),
                }))
            }
        };

        let outcome = {
            let mut sink = |stream: OutputStream, chunk: &str| {
                match stream {
                    OutputStream::Stdout => stdout.push_str(chunk),
                    OutputStream::Stderr => stderr.push_str(chunk),
                }
                tracing::trace!(?stream, chunk, "command output");
            };
            handle.run(command, ctx.command_timeout, &mut sink).await
        };

        let result = match outcome {
            Ok(exec) if exec.timed_out => CommandResult {
                success: false,
                stdout,
                stderr,
                exit_code: exec.exit_code,
                error: Some(format!(
                    "Command timed out after {}s",
                    ctx.command_timeout.as_secs()
                )),
            },
            Ok(exec) => CommandResult {
                success: exec.success(),
                stdout,
                stderr,
                exit_code: exec.exit_code,
                error: None,
            },
            Err(e) => {
                tracing::warn!(sandbox_id = %ctx.sandbox_id, error = %e, "Command handler failed");
                CommandResult {
                    success: false,
                    stdout,
                    stderr,
                    exit_code: -1,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(ToolInvocationResult::Command(result))
    }
}

// =============================================================================
// Write Files
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileArg {
    /// Path relative to the sandbox workspace, e.g. `src/app/page.tsx`.
    pub path: String,
    /// Full file content.
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WriteFilesArgs {
    /// Files to create or overwrite, written in order.
    pub files: Vec<FileArg>,
}

/// Writes a batch of files and records them in the job's file map.
pub struct WriteFilesTool;

#[async_trait]
impl SandboxTool for WriteFilesTool {
    fn name(&self) -> &str {
        "write_files"
    }

    fn description(&self) -> &str {
        "Create or overwrite files inside the sandbox. Paths are relative to the project root."
    }

    fn parameters(&self) -> Value {
        schema_of::<WriteFilesArgs>()
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, args: Value) -> Result<ToolInvocationResult> {
        let args: WriteFilesArgs = parse_args(self.name(), args)?;
        if args.files.is_empty() {
            return Err(Error::invalid_request("At least one file is required"));
        }

        // Reject bad paths and file/directory clashes before any write happens.
        let mut trial = ctx.files.clone();
        let mut batch = Vec::with_capacity(args.files.len());
        for file in &args.files {
            let key = trial.insert(&file.path, file.content.as_str())?;
            batch.push((key, file.content.as_str()));
        }

        let mut updated = ctx.files.clone();
        let handle = match ctx.manager.connect(ctx.sandbox_id).await {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(ToolInvocationResult::Write(WriteResult {
                    success: false,
                    updated_files: updated,
                    message: format!("Failed to write files: {}", e),
                }))
            }
        };

        let mut written = Vec::with_capacity(batch.len());
        for (path, content) in batch {
            if let Err(e) = handle.write_file(&path, content.as_bytes()).await {
                tracing::warn!(sandbox_id = %ctx.sandbox_id, path = %path, error = %e, "File write failed");
                return Ok(ToolInvocationResult::Write(WriteResult {
                    success: false,
                    updated_files: updated,
                    message: format!(
                        "Failed to write '{}' after writing {} file(s): {}",
                        path,
                        written.len(),
                        e
                    ),
                }));
            }
            updated.insert(&path, content)?;
            written.push(path);
        }

        Ok(ToolInvocationResult::Write(WriteResult {
            success: true,
            updated_files: updated,
            message: format!("Wrote {} file(s): {}", written.len(), written.join(", ")),
        }))
    }
}

// =============================================================================
// Read Files
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadFilesArgs {
    /// Paths relative to the project root.
    pub paths: Vec<String>,
}

/// Reads a batch of files; each path succeeds or fails on its own.
pub struct ReadFilesTool;

#[async_trait]
impl SandboxTool for ReadFilesTool {
    fn name(&self) -> &str {
        "read_files"
    }

    fn description(&self) -> &str {
        "Read files from the sandbox. A path that cannot be read reports its error in place of the content."
    }

    fn parameters(&self) -> Value {
        schema_of::<ReadFilesArgs>()
    }

    async fn invoke(&self, ctx: &ToolContext<'_>, args: Value) -> Result<ToolInvocationResult> {
        let args: ReadFilesArgs = parse_args(self.name(), args)?;
        if args.paths.is_empty() {
            return Err(Error::invalid_request("At least one path is required"));
        }
        if args.paths.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::invalid_request("Paths cannot be empty"));
        }

        let handle = match ctx.manager.connect(ctx.sandbox_id).await {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(ToolInvocationResult::Read(ReadResult {
                    success: false,
                    contents: BTreeMap::new(),
                    message: format!("Failed to read files: {}", e),
                }))
            }
        };

        let mut contents = BTreeMap::new();
        let mut failed = 0;
        for path in &args.paths {
            let read = match sandforge_core::fs_policy::normalize_relative_path(path) {
                Ok(key) => handle.read_file(&key).await,
                Err(e) => Err(e),
            };
            let content = match read {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    failed += 1;
                    format!("Error: {}", e)
                }
            };
            contents.insert(path.clone(), content);
        }

        Ok(ToolInvocationResult::Read(ReadResult {
            success: true,
            message: format!(
                "Read {} of {} file(s)",
                args.paths.len() - failed,
                args.paths.len()
            ),
            contents,
        }))
    }
}

// =============================================================================
// Tool Registry
// =============================================================================

/// Name-indexed set of sandbox tools.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn SandboxTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    /// Registry holding `run_command`, `write_files` and `read_files`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let defaults: [Arc<dyn SandboxTool>; 3] =
            [Arc::new(RunCommandTool), Arc::new(WriteFilesTool), Arc::new(ReadFilesTool)];
        for tool in defaults {
            registry.tools.insert(tool.name().to_string(), tool);
        }
        registry
    }

    /// Register a tool. Names must be unique.
    pub fn register(&self, tool: Arc<dyn SandboxTool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(Error::Internal(format!(
                "Tool '{}' is already registered",
                name
            )));
        }
        tracing::debug!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SandboxTool>> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    /// Definitions of every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.iter().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Dispatch a tool call to the tool registered under its name.
    pub async fn invoke(&self, ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolInvocationResult> {
        let name = call.tool_name();
        let tool = self.get(name).ok_or_else(|| Error::tool_not_found(name))?;
        let args = serde_json::to_value(call)?;
        tool.invoke(ctx, args).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
