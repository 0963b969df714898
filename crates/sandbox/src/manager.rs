//! Per-job sandbox lifecycle.
//!
//! A [`SandboxManager`] owns the sandboxes of a single job: it provisions them,
//! caches live handles, and tears them down at most once.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use sandforge_core::{Error, Result};

use crate::engine::{SandboxConfig, SandboxEngine, SandboxHandle, SandboxId};

/// What happened when a sandbox was torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum TeardownOutcome {
    /// The provider confirmed destruction.
    Destroyed,
    /// Teardown had already been attempted; nothing was done.
    AlreadyDestroyed,
    /// The provider failed. The failure was logged and swallowed.
    Failed(String),
}

impl TeardownOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Manages sandbox lifecycle on top of a [`SandboxEngine`].
pub struct SandboxManager {
    engine: Arc<dyn SandboxEngine>,
    config: SandboxConfig,
    connections: DashMap<SandboxId, Arc<dyn SandboxHandle>>,
    torn_down: DashSet<SandboxId>,
}

impl SandboxManager {
    /// Create a new sandbox manager.
    pub fn new(engine: Arc<dyn SandboxEngine>, config: SandboxConfig) -> Self {
        Self {
            engine,
            config,
            connections: DashMap::new(),
            torn_down: DashSet::new(),
        }
    }

    /// Provision a sandbox from the given template.
    pub async fn create(&self, template_id: &str) -> Result<SandboxId> {
        let config = self.config.clone().with_template(template_id);
        let id = self.engine.create(&config).await.map_err(|e| match e {
            Error::SandboxUnavailable(_) => e,
            other => Error::sandbox_unavailable(other.to_string()),
        })?;
        tracing::info!(sandbox_id = %id, template = %template_id, "Sandbox provisioned");
        Ok(id)
    }

    /// Resolve a sandbox to a live handle, reusing a cached one when present.
    pub async fn connect(&self, id: &SandboxId) -> Result<Arc<dyn SandboxHandle>> {
        if self.torn_down.contains(id) {
            return Err(Error::sandbox_unavailable(format!(
                "Sandbox {} has been destroyed",
                id
            )));
        }
        if let Some(handle) = self.connections.get(id) {
            return Ok(handle.clone());
        }

        let handle = self.engine.connect(id).await.map_err(|e| match e {
            Error::SandboxUnavailable(_) => e,
            other => Error::sandbox_unavailable(other.to_string()),
        })?;
        self.connections.insert(id.clone(), handle.clone());
        tracing::debug!(sandbox_id = %id, "Sandbox connected");
        Ok(handle)
    }

    /// Destroy a sandbox. Best effort and idempotent: never returns an error.
    pub async fn destroy(&self, id: &SandboxId) -> TeardownOutcome {
        // Mark first so concurrent or repeated calls reach the engine once.
        if !self.torn_down.insert(id.clone()) {
            tracing::debug!(sandbox_id = %id, "Sandbox teardown already attempted");
            return TeardownOutcome::AlreadyDestroyed;
        }
        self.connections.remove(id);

        match self.engine.destroy(id).await {
            Ok(()) => {
                tracing::info!(sandbox_id = %id, "Sandbox destroyed");
                TeardownOutcome::Destroyed
            }
            Err(e) => {
                tracing::warn!(sandbox_id = %id, error = %e, "Sandbox teardown failed");
                TeardownOutcome::Failed(e.to_string())
            }
        }
    }

    /// Get a reference to the sandbox engine.
    pub fn engine(&self) -> &Arc<dyn SandboxEngine> {
        &self.engine
    }

    /// Check if the sandbox backend is available.
    pub async fn is_available(&self) -> bool {
        self.engine.is_available().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSandbox;

    fn manager(mock: &MockSandbox) -> SandboxManager {
        SandboxManager::new(Arc::new(mock.clone()), SandboxConfig::default())
    }

    #[tokio::test]
    async fn test_connect_is_cached() {
        let mock = MockSandbox::default();
        let manager = manager(&mock);
        let id = manager.create("node:20").await.unwrap();

        manager.connect(&id).await.unwrap();
        manager.connect(&id).await.unwrap();
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let mock = MockSandbox::default();
        let manager = manager(&mock);
        let id = manager.create("node:20").await.unwrap();

        assert_eq!(manager.destroy(&id).await, TeardownOutcome::Destroyed);
        assert_eq!(manager.destroy(&id).await, TeardownOutcome::AlreadyDestroyed);
        assert_eq!(mock.destroy_calls(), 1);
        assert!(manager.connect(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_failure_is_swallowed() {
        let mock = MockSandbox::default().with_failing_destroy("daemon gone");
        let manager = manager(&mock);
        let id = manager.create("node:20").await.unwrap();

        let outcome = manager.destroy(&id).await;
        assert!(outcome.is_failed());
        assert_eq!(manager.destroy(&id).await, TeardownOutcome::AlreadyDestroyed);
        assert_eq!(mock.destroy_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_is_sandbox_unavailable() {
        let mock = MockSandbox::default().with_failing_create("quota exceeded");
        let err = manager(&mock).create("node:20").await.unwrap_err();
        assert!(matches!(err, Error::SandboxUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_connect() {
        let mock = MockSandbox::default().with_failing_connect("connection refused");
        let manager = manager(&mock);
        let id = manager.create("node:20").await.unwrap();
        let err = manager.connect(&id).await.err().unwrap();
        assert!(matches!(err, Error::SandboxUnavailable(_)));
    }
}
