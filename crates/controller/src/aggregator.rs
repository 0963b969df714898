//! Final result assembly and sandbox teardown.
//!
//! One [`ResultAggregator`] exists per job. `finalize` takes it by value, so
//! the result is produced and the sandbox released exactly once.

use sandforge_core::{JobResult, Result};
use sandforge_sandbox::{SandboxId, SandboxManager, TeardownOutcome};

use crate::network::{NetworkOutcome, StopReason};
use crate::steps::{StepRunner, DESTROY_SANDBOX};

/// Error text of a cancelled job.
pub const CANCELLED: &str = "job cancelled";

/// The job result together with what happened to its sandbox.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub result: JobResult,
    /// `None` when no sandbox was ever created.
    pub teardown: Option<TeardownOutcome>,
}

pub struct ResultAggregator<'a> {
    manager: &'a SandboxManager,
    steps: &'a StepRunner,
    sandbox_id: Option<SandboxId>,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(
        manager: &'a SandboxManager,
        steps: &'a StepRunner,
        sandbox_id: Option<SandboxId>,
    ) -> Self {
        Self {
            manager,
            steps,
            sandbox_id,
        }
    }

    /// Tear the sandbox down and build the job result.
    pub async fn finalize(self, outcome: Result<NetworkOutcome>) -> Finalized {
        let teardown = match &self.sandbox_id {
            Some(id) => Some(self.teardown(id).await),
            None => None,
        };
        let sandbox_id = self.sandbox_id.map(|id| id.0);

        let result = match outcome {
            Ok(NetworkOutcome {
                state,
                stop: StopReason::Cancelled,
                ..
            }) => JobResult {
                success: false,
                sandbox_id,
                files: state.files,
                summary: state.summary,
                error: Some(CANCELLED.to_string()),
            },
            Ok(NetworkOutcome { state, .. }) => JobResult {
                success: true,
                sandbox_id,
                files: state.files,
                summary: state.summary,
                error: None,
            },
            Err(e) => JobResult::failed(sandbox_id, e.to_string()),
        };

        Finalized { result, teardown }
    }

    async fn teardown(&self, id: &SandboxId) -> TeardownOutcome {
        let manager = self.manager;
        let mut observed = None;
        let slot = &mut observed;
        let recorded = self
            .steps
            .run(DESTROY_SANDBOX, move || async move {
                let outcome = manager.destroy(id).await;
                *slot = Some(outcome.clone());
                Ok(outcome)
            })
            .await;

        match recorded {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(sandbox_id = %id, error = %e, "Teardown step not recorded");
                match observed {
                    Some(outcome) => outcome,
                    // The log failed before the destroy ran; the sandbox must still go.
                    None => manager.destroy(id).await,
                }
            }
        }
    }
}
