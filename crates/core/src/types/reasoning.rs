use super::files::FileEntry;
use super::tool::ToolCall;
use serde::{Deserialize, Serialize};

// =============================================================================
// Reasoning Output Contract
// =============================================================================

/// One structured response from the reasoning model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningTurn {
    /// Tool calls to run, in order, before the output is considered.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// What the model concluded this turn.
    pub output: ReasoningOutput,
}

/// Final part of a reasoning turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasoningOutput {
    /// File directive: the model declares its generated files.
    Files {
        #[serde(default)]
        entries: Vec<FileEntry>,
        #[serde(default)]
        summary: Option<String>,
    },
    /// Free text; the model is still working.
    Text { text: String },
}

impl ReasoningTurn {
    /// A text-only turn with no tool calls.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tool_calls: Vec::new(),
            output: ReasoningOutput::Text { text: text.into() },
        }
    }

    /// A file directive with no tool calls.
    pub fn files(entries: Vec<FileEntry>, summary: impl Into<String>) -> Self {
        Self {
            tool_calls: Vec::new(),
            output: ReasoningOutput::Files {
                entries,
                summary: Some(summary.into()),
            },
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Whether this turn carries a file directive.
    pub fn has_directive(&self) -> bool {
        matches!(self.output, ReasoningOutput::Files { .. })
    }
}

impl ReasoningOutput {
    /// Text used as the job summary when a directive is accepted.
    pub fn summary_text(&self) -> String {
        match self {
            Self::Files {
                summary: Some(summary),
                ..
            } if !summary.trim().is_empty() => summary.clone(),
            Self::Files { entries, .. } => {
                let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
                format!("Generated {} file(s): {}", entries.len(), paths.join(", "))
            }
            Self::Text { text } => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive_turn() {
        let turn: ReasoningTurn = serde_json::from_str(
            r#"{
                "tool_calls": [{"tool":"run_command","command":"npm install"}],
                "output": {"kind":"files","entries":[{"path":"app/page.tsx","content":"x"}]}
            }"#,
        )
        .unwrap();
        assert!(turn.has_directive());
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.output.summary_text(), "Generated 1 file(s): app/page.tsx");
    }

    #[test]
    fn test_text_turn_defaults_tool_calls() {
        let turn: ReasoningTurn =
            serde_json::from_str(r#"{"output":{"kind":"text","text":"thinking"}}"#).unwrap();
        assert!(!turn.has_directive());
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn test_explicit_summary_wins() {
        let turn = ReasoningTurn::files(vec![FileEntry::new("a.txt", "1")], "Built a landing page");
        assert_eq!(turn.output.summary_text(), "Built a landing page");
    }
}
