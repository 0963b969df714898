//! Step log storage for replaying interrupted jobs.

use dashmap::DashMap;
use serde_json::Value;

use sandforge_core::{traits::StepLog, Result};

/// In-memory step log.
pub struct InMemoryStepLog {
    steps: DashMap<(String, String), Value>,
}

impl InMemoryStepLog {
    /// Create a new in-memory step log.
    pub fn new() -> Self {
        Self {
            steps: DashMap::new(),
        }
    }

    /// Get the number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Recorded step keys of a job, sorted.
    pub fn keys(&self, job_id: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .steps
            .iter()
            .filter(|r| r.key().0 == job_id)
            .map(|r| r.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop a recorded step so that it runs again on the next invocation.
    pub fn forget(&self, job_id: &str, step_key: &str) {
        self.steps
            .remove(&(job_id.to_string(), step_key.to_string()));
    }
}

impl Default for InMemoryStepLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StepLog for InMemoryStepLog {
    async fn load(&self, job_id: &str, step_key: &str) -> Result<Option<Value>> {
        Ok(self
            .steps
            .get(&(job_id.to_string(), step_key.to_string()))
            .map(|r| r.value().clone()))
    }

    async fn record(&self, job_id: &str, step_key: &str, output: Value) -> Result<()> {
        self.steps
            .insert((job_id.to_string(), step_key.to_string()), output);
        tracing::trace!(job_id = %job_id, step = %step_key, "Step recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_load() {
        let log = InMemoryStepLog::new();
        log.record("job-1", "create-sandbox", json!("sbx-1"))
            .await
            .unwrap();

        assert_eq!(
            log.load("job-1", "create-sandbox").await.unwrap(),
            Some(json!("sbx-1"))
        );
        assert_eq!(log.load("job-2", "create-sandbox").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_per_job() {
        let log = InMemoryStepLog::new();
        log.record("job-1", "round-1/reason", json!({})).await.unwrap();
        log.record("job-1", "create-sandbox", json!("s")).await.unwrap();
        log.record("job-2", "create-sandbox", json!("t")).await.unwrap();

        assert_eq!(log.keys("job-1"), vec!["create-sandbox", "round-1/reason"]);
        log.forget("job-1", "round-1/reason");
        assert_eq!(log.len(), 2);
    }
}
