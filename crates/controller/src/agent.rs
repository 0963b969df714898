//! Agents executed by the network.
//!
//! An agent step receives the [`AgentState`] by value and hands back the
//! updated state. The coding agent runs one reasoning call per round, executes
//! the requested tool calls in order, and records the summary once the model
//! declares its files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sandforge_core::{
    config::DirectivePolicy,
    events::{EventEnvelope, EventType, ToolExecPayload},
    traits::{ChatMessage, EventEmitter, LlmClient},
    AgentState, Error, ReasoningOutput, ReasoningTurn, Result, ToolCall, ToolInvocationResult,
};
use sandforge_sandbox::{SandboxId, SandboxManager, ToolContext, ToolRegistry};

use crate::parser::ResponseParser;
use crate::router::CODING_AGENT;
use crate::steps::{reason_key, tool_key, StepRunner};
use crate::telemetry;

/// Per-job context shared by every round.
pub struct AgentContext<'a> {
    pub job_id: &'a str,
    pub prompt: &'a str,
    pub sandbox_id: &'a SandboxId,
    pub manager: &'a SandboxManager,
    pub steps: &'a StepRunner,
    pub events: Option<&'a dyn EventEmitter>,
    /// Conversation with the reasoning model, grown round by round.
    pub transcript: Vec<ChatMessage>,
}

impl<'a> AgentContext<'a> {
    pub async fn emit(&self, event: EventEnvelope) {
        if let Some(events) = self.events {
            events.emit(event.with_sandbox(&self.sandbox_id.0)).await;
        }
    }
}

/// A participant in the agent network.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Run one round.
    async fn step(
        &self,
        ctx: &mut AgentContext<'_>,
        round: usize,
        state: AgentState,
    ) -> Result<AgentState>;
}

// =============================================================================
// Step records
// =============================================================================

/// Recorded output of a reasoning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReasoningRecord {
    raw: String,
    turn: ReasoningTurn,
}

/// Recorded output of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ToolStep {
    Completed { result: ToolInvocationResult },
    /// The tool refused its input; nothing ran.
    Rejected { error: String },
}

impl ToolStep {
    fn success(&self) -> bool {
        matches!(self, Self::Completed { result } if result.success())
    }
}

// =============================================================================
// Coding Agent
// =============================================================================

const CONTINUE_NUDGE: &str = "Continue. Call a tool, or reply with the files output once the project is complete.";
const DEFERRED_NUDGE: &str = "Your files output was set aside because the same reply also called tools. Review the tool results above, then send the files output again without tool calls.";

/// Agent that writes code in the sandbox by calling tools.
pub struct CodingAgent {
    name: String,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    parser: ResponseParser,
    policy: DirectivePolicy,
    command_timeout: Duration,
}

impl CodingAgent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: CODING_AGENT.to_string(),
            llm,
            tools,
            parser: ResponseParser::new(),
            policy: DirectivePolicy::default(),
            command_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_policy(mut self, policy: DirectivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build the system prompt listing the available tools.
    pub fn system_prompt(&self) -> String {
        let tools = self
            .tools
            .definitions()
            .into_iter()
            .map(|t| format!("- {}: {}\n  parameters: {}", t.name, t.description, t.parameters))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are an expert software engineer building a project inside an isolated sandbox.
All paths are relative to the project root. Work step by step: inspect, write files, run commands.

AVAILABLE TOOLS:
{tools}

RESPONSE FORMAT:
Reply with exactly one JSON object and nothing else.
While working:
{{"tool_calls": [{{"tool": "run_command", "command": "npm install"}}], "output": {{"kind": "text", "text": "<what you are doing>"}}}}
Each tool call names its tool in the "tool" field next to that tool's parameters.
When the project is complete:
{{"tool_calls": [], "output": {{"kind": "files", "entries": [{{"path": "app/page.tsx", "content": "..."}}], "summary": "<one paragraph>"}}}}
"entries" lists files to write before finishing; files written earlier are kept."#
        )
    }

    async fn reason(&self, ctx: &AgentContext<'_>, round: usize) -> Result<ReasoningRecord> {
        let llm = &self.llm;
        let parser = &self.parser;
        let transcript = &ctx.transcript;

        ctx.steps
            .run(&reason_key(round), || async move {
                let response = llm.chat(transcript).await.map_err(|e| match e {
                    Error::Reasoning(_) => e,
                    other => Error::reasoning(other.to_string()),
                })?;
                tracing::debug!(
                    round,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "LLM response received"
                );
                telemetry::track_tokens(
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens,
                );
                let turn = parser.parse(&response.content)?;
                Ok(ReasoningRecord {
                    raw: response.content,
                    turn,
                })
            })
            .await
    }

    /// Run one tool call, adopt written files into the state and report the
    /// outcome to the model.
    async fn run_tool(
        &self,
        ctx: &mut AgentContext<'_>,
        round: usize,
        index: usize,
        call: &ToolCall,
        state: &mut AgentState,
    ) -> Result<ToolStep> {
        let tool_name = call.tool_name();
        let started = Instant::now();

        let step = {
            let tool_ctx = ToolContext {
                manager: ctx.manager,
                sandbox_id: ctx.sandbox_id,
                files: &state.files,
                command_timeout: self.command_timeout,
            };
            let tools = &self.tools;
            let tool_ctx = &tool_ctx;
            ctx.steps
                .run(&tool_key(round, index), || async move {
                    match tools.invoke(tool_ctx, call).await {
                        Ok(result) => Ok(ToolStep::Completed { result }),
                        Err(e) if !e.is_fatal() => Ok(ToolStep::Rejected {
                            error: e.to_string(),
                        }),
                        Err(e) => Err(e),
                    }
                })
                .await?
        };

        let success = step.success();
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;
        tracing::info!(round, tool = tool_name, success, duration_ms, "Tool call finished");
        telemetry::track_tool_call(tool_name, success, elapsed.as_secs_f64());
        ctx.emit(
            EventEnvelope::new(
                EventType::ToolExecFinished,
                ctx.job_id,
                serde_json::to_value(ToolExecPayload {
                    tool_name: tool_name.to_string(),
                    round,
                    success,
                    duration_ms,
                })
                .unwrap_or_default(),
            )
            .with_actor(tool_name),
        )
        .await;

        if let ToolStep::Completed { result } = &step {
            if let Some(files) = result.updated_files() {
                state.files = files.clone();
            }
        }
        ctx.transcript
            .push(ChatMessage::user(observation(tool_name, &step)));

        Ok(step)
    }
}

/// Text fed back to the model for a tool call.
fn observation(tool_name: &str, step: &ToolStep) -> String {
    match step {
        ToolStep::Completed {
            result: ToolInvocationResult::Write(write),
        } => {
            // The model already knows the contents; keep the observation short.
            format!(
                "OBSERVATION ({}): {}",
                tool_name,
                serde_json::json!({"success": write.success, "message": write.message})
            )
        }
        ToolStep::Completed { result } => format!(
            "OBSERVATION ({}): {}",
            tool_name,
            serde_json::to_string(result).unwrap_or_default()
        ),
        ToolStep::Rejected { error } => {
            format!("OBSERVATION ({}): call rejected: {}", tool_name, error)
        }
    }
}

#[async_trait]
impl Agent for CodingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn step(
        &self,
        ctx: &mut AgentContext<'_>,
        round: usize,
        mut state: AgentState,
    ) -> Result<AgentState> {
        if ctx.transcript.is_empty() {
            ctx.transcript.push(ChatMessage::system(self.system_prompt()));
            ctx.transcript.push(ChatMessage::user(ctx.prompt));
        }

        let ReasoningRecord { raw, turn } = self.reason(ctx, round).await?;
        ctx.transcript.push(ChatMessage::assistant(raw));

        for (index, call) in turn.tool_calls.iter().enumerate() {
            self.run_tool(ctx, round, index, call, &mut state).await?;
        }

        match &turn.output {
            ReasoningOutput::Files { entries, .. } => {
                let accepted = match self.policy {
                    DirectivePolicy::Immediate => true,
                    DirectivePolicy::AfterToolCalls => turn.tool_calls.is_empty(),
                };
                if !accepted {
                    tracing::debug!(round, "File directive deferred until a turn without tool calls");
                    ctx.transcript.push(ChatMessage::user(DEFERRED_NUDGE));
                    return Ok(state);
                }

                if !entries.is_empty() {
                    let write = ToolCall::WriteFiles {
                        files: entries.clone(),
                    };
                    let step = self
                        .run_tool(ctx, round, turn.tool_calls.len(), &write, &mut state)
                        .await?;
                    match step {
                        ToolStep::Rejected { .. } => {
                            tracing::warn!(round, "File directive rejected; asking the model to fix it");
                            return Ok(state);
                        }
                        ToolStep::Completed { ref result } if !result.success() => {
                            tracing::warn!(round, "File directive only partially written");
                        }
                        ToolStep::Completed { .. } => {}
                    }
                }

                let summary = turn.output.summary_text();
                tracing::info!(round, file_count = state.files.len(), "File directive detected");
                ctx.emit(EventEnvelope::new(
                    EventType::DirectiveDetected,
                    ctx.job_id,
                    serde_json::json!({ "round": round, "file_count": state.files.len() }),
                )
                .with_actor(&self.name))
                .await;
                state.summary = Some(summary);
            }
            ReasoningOutput::Text { text } => {
                tracing::debug!(round, text_len = text.len(), "Agent still working");
                if turn.tool_calls.is_empty() {
                    ctx.transcript.push(ChatMessage::user(CONTINUE_NUDGE));
                }
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStepLog;
    use sandforge_core::mocks::MockLlm;
    use sandforge_core::FileEntry;
    use sandforge_sandbox::{MockSandbox, SandboxConfig};

    struct Fixture {
        manager: SandboxManager,
        sandbox_id: SandboxId,
        steps: StepRunner,
    }

    async fn fixture() -> Fixture {
        let manager = SandboxManager::new(Arc::new(MockSandbox::default()), SandboxConfig::default());
        let sandbox_id = manager.create("node:20").await.unwrap();
        Fixture {
            manager,
            sandbox_id,
            steps: StepRunner::new(Arc::new(InMemoryStepLog::new()), "job-1"),
        }
    }

    fn context(f: &Fixture) -> AgentContext<'_> {
        AgentContext {
            job_id: "job-1",
            prompt: "Build a landing page",
            sandbox_id: &f.sandbox_id,
            manager: &f.manager,
            steps: &f.steps,
            events: None,
            transcript: Vec::new(),
        }
    }

    fn agent(turns: Vec<ReasoningTurn>) -> CodingAgent {
        CodingAgent::new(
            Arc::new(MockLlm::with_turns(turns)),
            Arc::new(ToolRegistry::with_defaults()),
        )
    }

    #[tokio::test]
    async fn test_directive_with_tool_calls_sets_summary_immediately() {
        let f = fixture().await;
        let mut ctx = context(&f);
        let turn = ReasoningTurn::files(vec![], "Landing page done").with_tool_calls(vec![
            ToolCall::WriteFiles {
                files: vec![FileEntry::new("app/page.tsx", "x")],
            },
        ]);

        let state = agent(vec![turn])
            .step(&mut ctx, 1, AgentState::new())
            .await
            .unwrap();

        assert_eq!(state.summary.as_deref(), Some("Landing page done"));
        assert_eq!(state.files.get("app/page.tsx"), Some("x"));
    }

    #[tokio::test]
    async fn test_after_tool_calls_policy_defers_directive() {
        let f = fixture().await;
        let mut ctx = context(&f);
        let turn = ReasoningTurn::files(vec![], "done").with_tool_calls(vec![ToolCall::RunCommand {
            command: "npm test".into(),
        }]);

        let state = agent(vec![turn])
            .with_policy(DirectivePolicy::AfterToolCalls)
            .step(&mut ctx, 1, AgentState::new())
            .await
            .unwrap();

        assert!(state.summary.is_none());
        assert_eq!(ctx.transcript.last().unwrap().content, DEFERRED_NUDGE);
    }

    #[tokio::test]
    async fn test_directive_entries_are_written() {
        let f = fixture().await;
        let mut ctx = context(&f);
        let turn = ReasoningTurn {
            tool_calls: vec![],
            output: ReasoningOutput::Files {
                entries: vec![FileEntry::new("README.md", "# hi")],
                summary: None,
            },
        };

        let state = agent(vec![turn])
            .step(&mut ctx, 1, AgentState::new())
            .await
            .unwrap();

        assert_eq!(state.files.get("README.md"), Some("# hi"));
        assert_eq!(
            state.summary.as_deref(),
            Some("Generated 1 file(s): README.md")
        );
    }

    #[tokio::test]
    async fn test_invalid_tool_input_becomes_observation() {
        let f = fixture().await;
        let mut ctx = context(&f);
        let turn = ReasoningTurn::text("listing").with_tool_calls(vec![ToolCall::ReadFiles {
            paths: vec![],
        }]);

        let state = agent(vec![turn])
            .step(&mut ctx, 1, AgentState::new())
            .await
            .unwrap();

        assert!(state.summary.is_none());
        let last = &ctx.transcript.last().unwrap().content;
        assert!(last.contains("call rejected"), "got {}", last);
    }

    #[tokio::test]
    async fn test_reasoning_failure_fails_the_step() {
        let f = fixture().await;
        let mut ctx = context(&f);
        let agent = CodingAgent::new(
            Arc::new(MockLlm::constant("I'm still thinking about this problem...")),
            Arc::new(ToolRegistry::with_defaults()),
        );

        let err = agent
            .step(&mut ctx, 1, AgentState::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Reasoning(_)));
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let prompt = agent(vec![]).system_prompt();
        for tool in ["run_command", "write_files", "read_files"] {
            assert!(prompt.contains(tool));
        }
    }
}
