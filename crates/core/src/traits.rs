//! Core traits for Sandforge.
//!
//! These traits define the seams between the job engine and its external
//! collaborators: the reasoning model, the durable step log and event sinks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::events::EventEnvelope;

// =============================================================================
// Reasoning Model
// =============================================================================

/// LLM client interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a chat completion.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse>;
}

/// Chat message for LLM interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (system, user, assistant).
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated content.
    pub content: String,
    /// Finish reason.
    pub finish_reason: String,
    /// Token usage.
    pub usage: LlmUsage,
}

/// Token usage from LLM call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
}

// =============================================================================
// Durable Execution
// =============================================================================

/// Record of completed engine steps, keyed by job and step key.
///
/// An external runner may re-invoke a job after partial progress; steps whose
/// output is already recorded are replayed from here instead of re-executed.
#[async_trait]
pub trait StepLog: Send + Sync {
    /// Load the recorded output of a step.
    async fn load(&self, job_id: &str, step_key: &str) -> Result<Option<Value>>;

    /// Record the output of a completed step.
    async fn record(&self, job_id: &str, step_key: &str, output: Value) -> Result<()>;
}

// =============================================================================
// Events
// =============================================================================

/// Sink for structured job events.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emit an event. Emission never fails the job.
    async fn emit(&self, event: EventEnvelope);
}
