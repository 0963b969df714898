use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured Event Envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: String,
    /// Job the event belongs to
    pub job_id: String,
    /// Sandbox involved (if any)
    pub sandbox_id: Option<String>,
    /// Actor who triggered the event ('engine', an agent name, or a tool name)
    pub actor: String,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// Event type category
    pub event_type: EventType,
    /// Event severity level
    pub severity: EventSeverity,
    /// Structured payload (event-specific data)
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: EventType, job_id: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            sandbox_id: None,
            actor: "engine".to_string(),
            timestamp: Utc::now(),
            event_type,
            severity: EventSeverity::Info,
            payload,
        }
    }

    pub fn with_sandbox(mut self, sandbox_id: &str) -> Self {
        self.sandbox_id = Some(sandbox_id.to_string());
        self
    }

    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    JobStarted,
    SandboxCreated,
    RoundStarted,
    ToolExecFinished,
    DirectiveDetected,
    JobFinished,
    SandboxDestroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
}

/// Payload for [`EventType::ToolExecFinished`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecPayload {
    pub tool_name: String,
    pub round: usize,
    pub success: bool,
    pub duration_ms: u64,
}

/// Payload for [`EventType::JobFinished`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFinishedPayload {
    pub success: bool,
    pub rounds: usize,
    pub file_count: usize,
    pub error: Option<String>,
}
