//! Background job engine.
//!
//! A job runs as one acquire/release scope: provision a sandbox, drive the
//! agent network, then hand everything to a [`ResultAggregator`] which tears
//! the sandbox down and produces the single [`JobResult`]. The engine boundary
//! never returns an error; failures are reported inside the result.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use sandforge_core::{
    config::EngineConfig,
    events::{EventEnvelope, EventSeverity, EventType, JobFinishedPayload},
    traits::{EventEmitter, StepLog},
    AgentState, Job, JobResult, JobStatus, JobSubmission, Result,
};
use sandforge_sandbox::{
    SandboxConfig, SandboxEngine, SandboxId, SandboxManager, TeardownOutcome,
};

use crate::agent::{Agent, AgentContext};
use crate::aggregator::{Finalized, ResultAggregator};
use crate::builder::JobEngineBuilder;
use crate::network::AgentNetwork;
use crate::router::Router;
use crate::steps::{StepRunner, CREATE_SANDBOX};
use crate::telemetry;

/// Runs code-generation jobs end to end.
pub struct JobEngine {
    pub(crate) config: EngineConfig,
    pub(crate) sandbox_engine: Arc<dyn SandboxEngine>,
    pub(crate) sandbox_config: SandboxConfig,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) agents: Vec<Arc<dyn Agent>>,
    pub(crate) step_log: Arc<dyn StepLog>,
    pub(crate) event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl JobEngine {
    /// Create a new builder for JobEngine.
    pub fn builder() -> JobEngineBuilder {
        JobEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a submission and run it to completion.
    ///
    /// Invalid submissions are rejected before any sandbox work.
    pub async fn submit(&self, submission: JobSubmission) -> Result<(Job, JobResult)> {
        let mut job = Job::submit(submission)?;
        let result = self.run(&mut job).await;
        Ok((job, result))
    }

    /// Run a job that cannot be cancelled.
    pub async fn run(&self, job: &mut Job) -> JobResult {
        self.run_with_cancel(job, &CancellationToken::new()).await
    }

    /// Run a job. Cancellation takes effect between rounds.
    ///
    /// Re-running a job with the same id against the same step log replays
    /// the recorded steps and continues where the previous invocation stopped.
    pub async fn run_with_cancel(&self, job: &mut Job, cancel: &CancellationToken) -> JobResult {
        let span = tracing::info_span!("job", job_id = %job.id, project_id = %job.project_id);
        self.execute(job, cancel).instrument(span).await
    }

    async fn execute(&self, job: &mut Job, cancel: &CancellationToken) -> JobResult {
        let started = Instant::now();

        // A finished job already went through the aggregator; nothing is held.
        match job.start() {
            Ok(true) => tracing::info!("Resuming job"),
            Ok(false) => tracing::info!(prompt_len = job.prompt.len(), "Job started"),
            Err(e) => {
                tracing::warn!(error = %e, "Job cannot be started");
                return JobResult::failed(job.sandbox_id.clone(), e.to_string());
            }
        }
        self.emit(EventEnvelope::new(
            EventType::JobStarted,
            &job.id,
            serde_json::json!({ "project_id": job.project_id }),
        ))
        .await;

        let manager = SandboxManager::new(self.sandbox_engine.clone(), self.sandbox_config.clone());
        let steps = StepRunner::new(self.step_log.clone(), job.id.clone());

        let template = self.config.template_id.as_str();
        let mut provisioned: Option<SandboxId> = None;
        let slot = &mut provisioned;
        let creator = &manager;
        let created = steps
            .run(CREATE_SANDBOX, move || async move {
                let created = creator.create(template).await;
                if let Ok(ref id) = created {
                    *slot = Some(id.clone());
                }
                created
            })
            .await;

        let (finalized, rounds) = match created {
            Err(e) => {
                // A sandbox that exists but was not recorded is still released.
                if let Some(ref id) = provisioned {
                    job.sandbox_id = Some(id.0.clone());
                }
                tracing::error!(error = %e, "Sandbox provisioning failed");
                let finalized = ResultAggregator::new(&manager, &steps, provisioned)
                    .finalize(Err(e))
                    .await;
                (finalized, 0)
            }
            Ok(sandbox_id) => {
                job.sandbox_id = Some(sandbox_id.0.clone());
                self.emit(
                    EventEnvelope::new(EventType::SandboxCreated, &job.id, serde_json::json!({}))
                        .with_sandbox(&sandbox_id.0),
                )
                .await;

                let mut network = self.network();
                let outcome = {
                    let mut ctx = AgentContext {
                        job_id: &job.id,
                        prompt: &job.prompt,
                        sandbox_id: &sandbox_id,
                        manager: &manager,
                        steps: &steps,
                        events: self.event_emitter.as_deref(),
                        transcript: Vec::new(),
                    };
                    network.run(&mut ctx, AgentState::new(), cancel).await
                };

                let finalized = ResultAggregator::new(&manager, &steps, Some(sandbox_id))
                    .finalize(outcome)
                    .await;
                (finalized, network.rounds())
            }
        };

        self.complete(job, finalized, rounds, started.elapsed()).await
    }

    fn network(&self) -> AgentNetwork {
        self.agents.iter().fold(
            AgentNetwork::new(self.router.clone(), self.config.max_rounds),
            |network, agent| network.with_agent(agent.clone()),
        )
    }

    async fn complete(
        &self,
        job: &mut Job,
        finalized: Finalized,
        rounds: usize,
        elapsed: Duration,
    ) -> JobResult {
        let Finalized { result, teardown } = finalized;

        if let Some(teardown) = teardown {
            let severity = match teardown {
                TeardownOutcome::Failed(_) => EventSeverity::Warn,
                _ => EventSeverity::Info,
            };
            let mut event = EventEnvelope::new(
                EventType::SandboxDestroyed,
                &job.id,
                serde_json::to_value(&teardown).unwrap_or_default(),
            )
            .with_severity(severity);
            if let Some(ref sandbox_id) = job.sandbox_id {
                event = event.with_sandbox(sandbox_id);
            }
            self.emit(event).await;
        }

        let next = if result.success {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        if let Err(e) = job.transition(next) {
            tracing::warn!(error = %e, "Job status not updated");
        }

        let outcome = match (&result.error, result.success) {
            (_, true) => "succeeded",
            (Some(error), false) if error == crate::aggregator::CANCELLED => "cancelled",
            _ => "failed",
        };
        telemetry::track_job(outcome, elapsed.as_secs_f64());
        tracing::info!(
            outcome,
            rounds,
            file_count = result.files.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Job finished"
        );

        self.emit(
            EventEnvelope::new(
                EventType::JobFinished,
                &job.id,
                serde_json::to_value(JobFinishedPayload {
                    success: result.success,
                    rounds,
                    file_count: result.files.len(),
                    error: result.error.clone(),
                })
                .unwrap_or_default(),
            )
            .with_severity(if result.success {
                EventSeverity::Info
            } else {
                EventSeverity::Error
            }),
        )
        .await;

        result
    }

    async fn emit(&self, event: EventEnvelope) {
        if let Some(emitter) = &self.event_emitter {
            emitter.emit(event).await;
        }
    }
}

