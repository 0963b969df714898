//! Bounded multi-round agent network.
//!
//! Each round the router inspects the state and either terminates the network
//! or names the agent that runs next. The round counter never exceeds the
//! configured maximum, whatever the router decides.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use sandforge_core::{
    events::{EventEnvelope, EventType},
    AgentState, Error, Result,
};

use crate::agent::{Agent, AgentContext};
use crate::router::{RouteDecision, Router};
use crate::telemetry;

/// Lifecycle of one network run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Why a completed network stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The router returned `Terminate`.
    Terminated,
    /// The round cap was reached first.
    RoundCapReached,
    /// Cancellation was requested between rounds.
    Cancelled,
}

/// Final state of a completed network.
#[derive(Debug, Clone)]
pub struct NetworkOutcome {
    pub state: AgentState,
    pub rounds: usize,
    pub stop: StopReason,
}

/// Router plus the agents it can select.
pub struct AgentNetwork {
    router: Arc<dyn Router>,
    agents: HashMap<String, Arc<dyn Agent>>,
    max_rounds: usize,
    status: NetworkStatus,
    rounds: usize,
}

impl AgentNetwork {
    pub fn new(router: Arc<dyn Router>, max_rounds: usize) -> Self {
        Self {
            router,
            agents: HashMap::new(),
            max_rounds,
            status: NetworkStatus::Idle,
            rounds: 0,
        }
    }

    /// Add an agent, addressable by its name.
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(agent.name().to_string(), agent);
        self
    }

    pub fn status(&self) -> NetworkStatus {
        self.status
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Rounds scheduled by the latest run, including a failed last round.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Run rounds until the router terminates, the cap is hit, or `cancel`
    /// fires. A failing round fails the whole network.
    pub async fn run(
        &mut self,
        ctx: &mut AgentContext<'_>,
        initial: AgentState,
        cancel: &CancellationToken,
    ) -> Result<NetworkOutcome> {
        self.status = NetworkStatus::Running;
        self.rounds = 0;
        let mut state = initial;
        let mut rounds = 0;

        let stop = loop {
            if cancel.is_cancelled() {
                tracing::info!(job_id = %ctx.job_id, rounds, "Cancellation requested; no further rounds");
                break StopReason::Cancelled;
            }

            let agent = match self.router.route(&state) {
                RouteDecision::Terminate => break StopReason::Terminated,
                RouteDecision::Agent(name) => {
                    if rounds >= self.max_rounds {
                        tracing::warn!(job_id = %ctx.job_id, max_rounds = self.max_rounds, "Round cap reached");
                        break StopReason::RoundCapReached;
                    }
                    match self.agents.get(&name) {
                        Some(agent) => agent.clone(),
                        None => {
                            self.status = NetworkStatus::Failed;
                            return Err(Error::controller(format!(
                                "Router selected unknown agent '{}'",
                                name
                            )));
                        }
                    }
                }
            };

            rounds += 1;
            self.rounds = rounds;
            tracing::info!(job_id = %ctx.job_id, round = rounds, agent = agent.name(), "Round started");
            telemetry::track_round();
            ctx.emit(
                EventEnvelope::new(
                    EventType::RoundStarted,
                    ctx.job_id,
                    serde_json::json!({ "round": rounds }),
                )
                .with_actor(agent.name()),
            )
            .await;

            state = match agent.step(ctx, rounds, state).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(job_id = %ctx.job_id, round = rounds, error = %e, "Round failed");
                    self.status = NetworkStatus::Failed;
                    return Err(e);
                }
            };
        };

        self.status = NetworkStatus::Completed;
        Ok(NetworkOutcome {
            state,
            rounds,
            stop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStepLog;
    use crate::router::DefaultRouter;
    use crate::steps::StepRunner;
    use async_trait::async_trait;
    use sandforge_core::FileCollection;
    use sandforge_sandbox::{MockSandbox, SandboxConfig, SandboxId, SandboxManager};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Agent that writes one file per round and finishes on `finish_at`.
    struct ScriptedAgent {
        calls: AtomicUsize,
        finish_at: Option<usize>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedAgent {
        fn new(finish_at: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                finish_at,
                cancel_after: None,
            }
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            crate::router::CODING_AGENT
        }

        async fn step(
            &self,
            _ctx: &mut AgentContext<'_>,
            round: usize,
            state: AgentState,
        ) -> Result<AgentState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut files: FileCollection = state.files.clone();
            files.insert(&format!("round-{}.txt", round), "x")?;
            let state = state.with_files(files);
            if let Some((at, token)) = &self.cancel_after {
                if *at == round {
                    token.cancel();
                }
            }
            Ok(match self.finish_at {
                Some(at) if at == round => state.with_summary("done"),
                _ => state,
            })
        }
    }

    struct AlwaysContinue;

    impl Router for AlwaysContinue {
        fn route(&self, _state: &AgentState) -> RouteDecision {
            RouteDecision::Agent(crate::router::CODING_AGENT.to_string())
        }
    }

    async fn run(
        network: &mut AgentNetwork,
        cancel: &CancellationToken,
    ) -> Result<NetworkOutcome> {
        let manager = SandboxManager::new(Arc::new(MockSandbox::default()), SandboxConfig::default());
        let sandbox_id = SandboxId::from("sbx-test");
        let steps = StepRunner::new(Arc::new(InMemoryStepLog::new()), "job-1");
        let mut ctx = AgentContext {
            job_id: "job-1",
            prompt: "p",
            sandbox_id: &sandbox_id,
            manager: &manager,
            steps: &steps,
            events: None,
            transcript: Vec::new(),
        };
        network.run(&mut ctx, AgentState::new(), cancel).await
    }

    #[tokio::test]
    async fn test_always_continue_router_is_bounded() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let mut network = AgentNetwork::new(Arc::new(AlwaysContinue), 15).with_agent(agent.clone());

        let outcome = run(&mut network, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.rounds, 15);
        assert_eq!(outcome.stop, StopReason::RoundCapReached);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 15);
        assert_eq!(outcome.state.files.len(), 15);
        assert_eq!(network.status(), NetworkStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminates_when_summary_set() {
        let agent = Arc::new(ScriptedAgent::new(Some(3)));
        let mut network = AgentNetwork::new(Arc::new(DefaultRouter::new()), 15).with_agent(agent.clone());

        let outcome = run(&mut network, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.stop, StopReason::Terminated);
        assert_eq!(outcome.state.summary.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_unknown_agent_fails_network() {
        let mut network =
            AgentNetwork::new(Arc::new(DefaultRouter::for_agent("reviewer")), 5)
                .with_agent(Arc::new(ScriptedAgent::new(None)));

        let err = run(&mut network, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Controller(_)));
        assert_eq!(network.status(), NetworkStatus::Failed);
        assert_eq!(network.rounds(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_between_rounds() {
        let cancel = CancellationToken::new();
        let agent = Arc::new(ScriptedAgent {
            cancel_after: Some((2, cancel.clone())),
            ..ScriptedAgent::new(None)
        });
        let mut network = AgentNetwork::new(Arc::new(AlwaysContinue), 15).with_agent(agent);

        let outcome = run(&mut network, &cancel).await.unwrap();

        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert_eq!(outcome.state.files.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_round_cap() {
        let mut network = AgentNetwork::new(Arc::new(AlwaysContinue), 0)
            .with_agent(Arc::new(ScriptedAgent::new(None)));
        let outcome = run(&mut network, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.stop, StopReason::RoundCapReached);
    }
}
