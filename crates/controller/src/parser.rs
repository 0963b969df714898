//! Parser for reasoning model responses.
//!
//! The model answers with a JSON [`ReasoningTurn`], optionally wrapped in a
//! markdown code fence. Anything else is a reasoning failure.

use sandforge_core::{Error, ReasoningTurn, Result};

/// Parses raw model output into a structured turn.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an LLM response into a reasoning turn.
    pub fn parse(&self, response: &str) -> Result<ReasoningTurn> {
        let body = Self::strip_fence(response.trim());
        if body.is_empty() {
            return Err(Error::reasoning("Model returned an empty response"));
        }

        serde_json::from_str::<ReasoningTurn>(body)
            .or_else(|first| {
                // Some models add prose around the object; retry on the outermost braces.
                Self::outer_object(body)
                    .and_then(|inner| serde_json::from_str::<ReasoningTurn>(inner).ok())
                    .ok_or(first)
            })
            .map_err(|e| Error::reasoning(format!("Unparseable model output: {}", e)))
    }

    fn strip_fence(response: &str) -> &str {
        let Some(rest) = response.strip_prefix("```") else {
            return response;
        };
        // Drop the info string (`json`, `JSON`, ...) up to the first newline.
        let rest = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
        rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
    }

    fn outer_object(body: &str) -> Option<&str> {
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        (start < end).then(|| &body[start..=end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandforge_core::{ReasoningOutput, ToolCall};

    #[test]
    fn test_parse_plain_json() {
        let turn = ResponseParser::new()
            .parse(r#"{"tool_calls":[{"tool":"run_command","command":"ls"}],"output":{"kind":"text","text":"checking"}}"#)
            .unwrap();
        assert_eq!(
            turn.tool_calls,
            vec![ToolCall::RunCommand {
                command: "ls".into()
            }]
        );
        assert!(!turn.has_directive());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"output\":{\"kind\":\"files\",\"entries\":[],\"summary\":\"done\"}}\n```";
        let turn = ResponseParser::new().parse(raw).unwrap();
        assert!(turn.tool_calls.is_empty());
        assert_eq!(
            turn.output,
            ReasoningOutput::Files {
                entries: vec![],
                summary: Some("done".into())
            }
        );
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let raw = "Here is my plan:\n{\"output\":{\"kind\":\"text\",\"text\":\"thinking\"}}\nThanks";
        let turn = ResponseParser::new().parse(raw).unwrap();
        assert_eq!(turn, ReasoningTurn::text("thinking"));
    }

    #[test]
    fn test_unparseable_output_is_reasoning_error() {
        let parser = ResponseParser::new();
        for raw in ["", "I'm still thinking about this problem...", "{\"output\":{\"kind\":\"poem\"}}"] {
            let err = parser.parse(raw).unwrap_err();
            assert!(matches!(err, Error::Reasoning(_)), "input {:?}", raw);
        }
    }
}
