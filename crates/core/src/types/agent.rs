use super::files::FileCollection;
use serde::{Deserialize, Serialize};

// =============================================================================
// Agent State
// =============================================================================

/// State carried across the rounds of one job.
///
/// Passed by value into each agent step and returned updated; the router only
/// ever sees a shared reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// Files written so far.
    pub files: FileCollection,
    /// Final summary. Set once a file directive is detected.
    pub summary: Option<String>,
}

impl AgentState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the file map with the result of a write batch.
    pub fn with_files(mut self, files: FileCollection) -> Self {
        self.files = files;
        self
    }

    /// Record the summary produced by a file directive.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Whether the agent has produced its final summary.
    pub fn is_finished(&self) -> bool {
        self.summary.is_some()
    }
}
