//! Memoized execution of a job's top-level operations.
//!
//! Each suspension point of a job (sandbox creation, one reasoning call, one
//! tool call, teardown) runs under a stable step key. When the key already has
//! a recorded output, that output is returned and the operation is skipped.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sandforge_core::{traits::StepLog, Error, Result};

pub const CREATE_SANDBOX: &str = "create-sandbox";
pub const DESTROY_SANDBOX: &str = "destroy-sandbox";

/// Key of the reasoning call of a round.
pub fn reason_key(round: usize) -> String {
    format!("round-{}/reason", round)
}

/// Key of the `index`th tool call of a round.
pub fn tool_key(round: usize, index: usize) -> String {
    format!("round-{}/tool-{}", round, index)
}

/// Runs operations through a [`StepLog`] for one job.
pub struct StepRunner {
    log: Arc<dyn StepLog>,
    job_id: String,
    replayed: AtomicUsize,
}

impl StepRunner {
    pub fn new(log: Arc<dyn StepLog>, job_id: impl Into<String>) -> Self {
        Self {
            log,
            job_id: job_id.into(),
            replayed: AtomicUsize::new(0),
        }
    }

    /// Run `op` unless `key` already has a recorded output.
    ///
    /// Failed operations are not recorded, so a later invocation retries them.
    pub async fn run<T, F, Fut>(&self, key: &str, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(recorded) = self.log.load(&self.job_id, key).await? {
            let output = serde_json::from_value(recorded).map_err(|e| {
                Error::step_log(format!("Recorded output of step '{}' is unreadable: {}", key, e))
            })?;
            self.replayed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(job_id = %self.job_id, step = %key, "Replaying recorded step");
            return Ok(output);
        }

        let output = op().await?;
        let value = serde_json::to_value(&output)?;
        self.log.record(&self.job_id, key, value).await?;
        Ok(output)
    }

    /// Number of steps answered from the log.
    pub fn replayed(&self) -> usize {
        self.replayed.load(Ordering::Relaxed)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStepLog;

    #[tokio::test]
    async fn test_recorded_step_is_replayed() {
        let log = Arc::new(InMemoryStepLog::new());
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let runner = StepRunner::new(log.clone(), "job-1");
            let out: String = runner
                .run(CREATE_SANDBOX, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("sbx-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(out, "sbx-1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_step_is_not_recorded() {
        let log = Arc::new(InMemoryStepLog::new());
        let runner = StepRunner::new(log.clone(), "job-1");

        let failed: Result<u32> = runner
            .run(&reason_key(1), || async { Err(Error::reasoning("timeout")) })
            .await;
        assert!(failed.is_err());
        assert!(log.is_empty());

        let retried: u32 = runner.run(&reason_key(1), || async { Ok(7) }).await.unwrap();
        assert_eq!(retried, 7);
        assert_eq!(runner.replayed(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_step_log_error() {
        let log = Arc::new(InMemoryStepLog::new());
        log.record("job-1", "round-1/tool-0", serde_json::json!("not a number"))
            .await
            .unwrap();
        let runner = StepRunner::new(log, "job-1");

        let err = runner
            .run(&tool_key(1, 0), || async { Ok(1u32) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StepLog(_)));
    }
}
