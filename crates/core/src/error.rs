//! Error types for Sandforge.

use thiserror::Error;

/// Result type alias using Sandforge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Sandforge.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Submission / Input Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // =========================================================================
    // Sandbox Errors
    // =========================================================================
    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    // =========================================================================
    // Tool Errors
    // =========================================================================
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    #[error("Reasoning failed: {0}")]
    Reasoning(String),

    #[error("Controller error: {0}")]
    Controller(String),

    #[error("Step log error: {0}")]
    StepLog(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a sandbox unavailable error.
    pub fn sandbox_unavailable(msg: impl Into<String>) -> Self {
        Self::SandboxUnavailable(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a reasoning error.
    pub fn reasoning(msg: impl Into<String>) -> Self {
        Self::Reasoning(msg.into())
    }

    /// Create a controller error.
    pub fn controller(msg: impl Into<String>) -> Self {
        Self::Controller(msg.into())
    }

    /// Create a step log error.
    pub fn step_log(msg: impl Into<String>) -> Self {
        Self::StepLog(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error aborts the whole job rather than a single tool call.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ToolExecution(_) | Self::ToolNotFound(_) | Self::InvalidRequest(_)
        )
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_are_not_fatal() {
        assert!(!Error::tool_execution("exit 1").is_fatal());
        assert!(!Error::tool_not_found("rm_rf").is_fatal());
        assert!(Error::reasoning("bad json").is_fatal());
        assert!(Error::sandbox_unavailable("docker down").is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::InvalidTransition {
            from: "Succeeded".into(),
            to: "Running".into(),
        };
        assert_eq!(err.to_string(), "Invalid status transition: Succeeded -> Running");
    }
}
