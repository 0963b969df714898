//! Round routing.
//!
//! The router decides, from the agent state alone, whether the network runs
//! another round and which agent runs it.

use sandforge_core::AgentState;

/// Name of the single built-in agent.
pub const CODING_AGENT: &str = "coding_agent";

/// Routing decision for the next round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Run the named agent.
    Agent(String),
    /// Stop the network.
    Terminate,
}

/// Selects the next agent. Must be a pure function of the state.
pub trait Router: Send + Sync {
    fn route(&self, state: &AgentState) -> RouteDecision;
}

/// Routes to the coding agent until a summary has been recorded.
#[derive(Debug, Clone)]
pub struct DefaultRouter {
    agent: String,
}

impl DefaultRouter {
    pub fn new() -> Self {
        Self::for_agent(CODING_AGENT)
    }

    /// Route to a differently named agent.
    pub fn for_agent(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
        }
    }
}

impl Default for DefaultRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for DefaultRouter {
    fn route(&self, state: &AgentState) -> RouteDecision {
        if state.summary.is_some() {
            RouteDecision::Terminate
        } else {
            RouteDecision::Agent(self.agent.clone())
        }
    }
}
