//! Builder for JobEngine.

use sandforge_core::{
    config::EngineConfig,
    traits::{EventEmitter, LlmClient, StepLog},
    Error, Result,
};
use sandforge_sandbox::{SandboxConfig, SandboxEngine, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::{Agent, CodingAgent};
use crate::engine::JobEngine;
use crate::persistence::InMemoryStepLog;
use crate::router::{DefaultRouter, Router};

/// Builder for constructing a JobEngine.
pub struct JobEngineBuilder {
    config: EngineConfig,
    sandbox_engine: Option<Arc<dyn SandboxEngine>>,
    sandbox_config: SandboxConfig,
    llm: Option<Arc<dyn LlmClient>>,
    tools: Option<Arc<ToolRegistry>>,
    router: Option<Arc<dyn Router>>,
    step_log: Option<Arc<dyn StepLog>>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
    agents: Vec<Arc<dyn Agent>>,
}

impl JobEngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            sandbox_engine: None,
            sandbox_config: SandboxConfig::default(),
            llm: None,
            tools: None,
            router: None,
            step_log: None,
            event_emitter: None,
            agents: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sandbox provider.
    pub fn with_sandbox_engine(mut self, engine: Arc<dyn SandboxEngine>) -> Self {
        self.sandbox_engine = Some(engine);
        self
    }

    /// Set resource limits and network profile for new sandboxes.
    pub fn with_sandbox_config(mut self, config: SandboxConfig) -> Self {
        self.sandbox_config = config;
        self
    }

    /// Set the LLM client driving the coding agent.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the tool registry. Defaults to the built-in sandbox tools.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Set the step log. Defaults to an in-memory log owned by the engine.
    pub fn with_step_log(mut self, step_log: Arc<dyn StepLog>) -> Self {
        self.step_log = Some(step_log);
        self
    }

    /// Set the event emitter for structured events.
    pub fn with_event_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    /// Add an agent. An agent with the same name as the coding agent replaces it.
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Build the JobEngine.
    pub fn build(self) -> Result<JobEngine> {
        let sandbox_engine = self
            .sandbox_engine
            .ok_or_else(|| Error::Config("Sandbox engine is required".into()))?;

        let mut agents: Vec<Arc<dyn Agent>> = Vec::new();
        if let Some(llm) = self.llm {
            let tools = self
                .tools
                .unwrap_or_else(|| Arc::new(ToolRegistry::with_defaults()));
            agents.push(Arc::new(
                CodingAgent::new(llm, tools)
                    .with_policy(self.config.directive_policy)
                    .with_command_timeout(Duration::from_secs(self.config.command_timeout_secs)),
            ));
        }
        agents.extend(self.agents);
        if agents.is_empty() {
            return Err(Error::Config("LLM client is required".into()));
        }

        Ok(JobEngine {
            config: self.config,
            sandbox_engine,
            sandbox_config: self.sandbox_config,
            router: self
                .router
                .unwrap_or_else(|| Arc::new(DefaultRouter::new())),
            agents,
            step_log: self
                .step_log
                .unwrap_or_else(|| Arc::new(InMemoryStepLog::new())),
            event_emitter: self.event_emitter,
        })
    }
}

impl Default for JobEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandforge_core::mocks::MockLlm;
    use sandforge_sandbox::MockSandbox;

    #[test]
    fn test_build_requires_sandbox_engine() {
        let result = JobEngineBuilder::new()
            .with_llm(Arc::new(MockLlm::constant("{}")))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_requires_llm_or_agent() {
        let result = JobEngineBuilder::new()
            .with_sandbox_engine(Arc::new(MockSandbox::default()))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_uses_config() {
        let engine = JobEngine::builder()
            .with_config(EngineConfig {
                max_rounds: 4,
                ..EngineConfig::default()
            })
            .with_sandbox_engine(Arc::new(MockSandbox::default()))
            .with_llm(Arc::new(MockLlm::constant("{}")))
            .build()
            .unwrap();
        assert_eq!(engine.config().max_rounds, 4);
        assert_eq!(engine.agents.len(), 1);
    }
}
