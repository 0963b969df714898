use super::files::{FileCollection, FileEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Tool Calls
// =============================================================================

/// A tool invocation requested by the reasoning model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    /// Run a shell command inside the sandbox.
    RunCommand { command: String },
    /// Create or overwrite files inside the sandbox.
    WriteFiles { files: Vec<FileEntry> },
    /// Read files from the sandbox.
    ReadFiles { paths: Vec<String> },
}

impl ToolCall {
    /// Registry name of the tool this call targets.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::RunCommand { .. } => "run_command",
            Self::WriteFiles { .. } => "write_files",
            Self::ReadFiles { .. } => "read_files",
        }
    }
}

/// Tool definition advertised to the reasoning model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// JSON Schema for tool arguments.
    pub parameters: serde_json::Value,
}

// =============================================================================
// Tool Results
// =============================================================================

/// Outcome of a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Observed exit code, or -1 when the command never completed.
    pub exit_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a write batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    /// The full file map after the batch, including files written before a
    /// mid-batch failure.
    pub updated_files: FileCollection,
    pub message: String,
}

/// Outcome of a read batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub success: bool,
    /// Per-path content; a failed read holds its error text instead.
    pub contents: BTreeMap<String, String>,
    pub message: String,
}

/// Structured envelope returned by every tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ToolInvocationResult {
    Command(CommandResult),
    Write(WriteResult),
    Read(ReadResult),
}

impl ToolInvocationResult {
    /// Whether the tool reported success.
    pub fn success(&self) -> bool {
        match self {
            Self::Command(r) => r.success,
            Self::Write(r) => r.success,
            Self::Read(r) => r.success,
        }
    }

    /// Files to adopt into the agent state, if this was a write.
    pub fn updated_files(&self) -> Option<&FileCollection> {
        match self {
            Self::Write(r) => Some(&r.updated_files),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_wire_format() {
        let call: ToolCall = serde_json::from_str(
            r#"{"tool":"write_files","files":[{"path":"a.txt","content":"1"}]}"#,
        )
        .unwrap();
        assert_eq!(call.tool_name(), "write_files");
        assert_eq!(
            call,
            ToolCall::WriteFiles {
                files: vec![FileEntry::new("a.txt", "1")]
            }
        );

        let unknown = serde_json::from_str::<ToolCall>(r#"{"tool":"delete_files","paths":[]}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_result_envelope_is_tagged() {
        let result = ToolInvocationResult::Command(CommandResult {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 1,
            error: None,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["operation"], "command");
        assert_eq!(json["exit_code"], 1);
        assert!(json.get("error").is_none());
        assert!(!result.success());
        assert!(result.updated_files().is_none());
    }
}
