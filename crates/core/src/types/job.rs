use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::files::FileCollection;
use crate::{Error, Result};

/// Maximum prompt length accepted at submission.
pub const MAX_PROMPT_CHARS: usize = 5000;

// =============================================================================
// Submission
// =============================================================================

/// Request to generate code for a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub prompt: String,
    pub project_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl JobSubmission {
    pub fn new(prompt: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            project_id: project_id.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Reject submissions that must never reach a sandbox.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::invalid_request("Prompt cannot be empty"));
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(Error::invalid_request(format!(
                "Prompt is too long (max {} characters)",
                MAX_PROMPT_CHARS
            )));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::invalid_request("Project ID is required"));
        }
        Ok(())
    }
}

// =============================================================================
// Job
// =============================================================================

/// Lifecycle status of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A submitted code-generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub prompt: String,
    pub project_id: String,
    pub metadata: serde_json::Value,
    pub status: JobStatus,
    pub sandbox_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Validate a submission and create a pending job for it.
    pub fn submit(submission: JobSubmission) -> Result<Self> {
        submission.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            prompt: submission.prompt,
            project_id: submission.project_id,
            metadata: submission.metadata,
            status: JobStatus::Pending,
            sandbox_id: None,
            created_at: Utc::now(),
        })
    }

    /// Move the job to `next`, refusing to go backwards.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Enter `Running`. Returns `true` when the job was already running,
    /// i.e. an earlier invocation was suspended and this one resumes it.
    pub fn start(&mut self) -> Result<bool> {
        match self.status {
            JobStatus::Running => Ok(true),
            _ => self.transition(JobStatus::Running).map(|()| false),
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// The single terminal artifact of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub sandbox_id: Option<String>,
    pub files: FileCollection,
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    /// A job that ran to completion.
    pub fn completed(
        sandbox_id: impl Into<String>,
        files: FileCollection,
        summary: Option<String>,
    ) -> Self {
        Self {
            success: true,
            sandbox_id: Some(sandbox_id.into()),
            files,
            summary,
            error: None,
        }
    }

    /// A job that failed; `sandbox_id` is `None` when provisioning never succeeded.
    pub fn failed(sandbox_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            sandbox_id,
            files: FileCollection::new(),
            summary: None,
            error: Some(error.into()),
        }
    }

    /// Keep partial files on a failed result.
    pub fn with_files(mut self, files: FileCollection) -> Self {
        self.files = files;
        self
    }
}
