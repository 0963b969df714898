//! In-memory mock sandbox for testing without Docker.
//!
//! Commands answer from a scripted queue (or a default success), files live in
//! a per-sandbox map, and failures can be injected at every contract point.
//! Call counters let tests assert how often each operation ran.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use sandforge_core::{Error, Result};

use crate::engine::{
    ExecResult, OutputSink, OutputStream, SandboxConfig, SandboxEngine, SandboxHandle, SandboxId,
};

#[derive(Default)]
struct MockState {
    exec_responses: Mutex<VecDeque<ExecResult>>,
    executed: Mutex<Vec<String>>,
    files: Mutex<HashMap<SandboxId, HashMap<String, Vec<u8>>>>,
    live: Mutex<HashSet<SandboxId>>,
    fail_create: Option<String>,
    fail_connect: Option<String>,
    fail_destroy: Option<String>,
    fail_exec: Option<String>,
    fail_write_paths: HashSet<String>,
    create_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
}

/// In-memory mock sandbox engine.
#[derive(Clone, Default)]
pub struct MockSandbox {
    state: Arc<MockState>,
}

impl MockSandbox {
    /// Create a mock sandbox with predefined exec responses.
    pub fn new(responses: Vec<ExecResult>) -> Self {
        Self {
            state: Arc::new(MockState {
                exec_responses: Mutex::new(responses.into()),
                ..Default::default()
            }),
        }
    }

    fn configure(self, apply: impl FnOnce(&mut MockState)) -> Self {
        let mut state = Arc::try_unwrap(self.state).unwrap_or_else(|shared| MockState {
            exec_responses: Mutex::new(
                shared
                    .exec_responses
                    .try_lock()
                    .map(|q| q.clone())
                    .unwrap_or_default(),
            ),
            fail_create: shared.fail_create.clone(),
            fail_connect: shared.fail_connect.clone(),
            fail_destroy: shared.fail_destroy.clone(),
            fail_exec: shared.fail_exec.clone(),
            fail_write_paths: shared.fail_write_paths.clone(),
            ..Default::default()
        });
        apply(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Make `create` fail with a provider error.
    pub fn with_failing_create(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|s| s.fail_create = Some(message))
    }

    /// Make `connect` fail as if the sandbox were unreachable.
    pub fn with_failing_connect(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|s| s.fail_connect = Some(message))
    }

    /// Make `destroy` fail.
    pub fn with_failing_destroy(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|s| s.fail_destroy = Some(message))
    }

    /// Make every command fail mid-stream after emitting partial output.
    pub fn with_failing_exec(self, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|s| s.fail_exec = Some(message))
    }

    /// Make writes to `path` fail.
    pub fn with_failing_write(self, path: &str) -> Self {
        let path = path.to_string();
        self.configure(|s| {
            s.fail_write_paths.insert(path);
        })
    }

    /// Number of `create` calls.
    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls.
    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls.
    pub fn destroy_calls(&self) -> usize {
        self.state.destroy_calls.load(Ordering::SeqCst)
    }

    /// Commands executed so far, in order.
    pub async fn executed_commands(&self) -> Vec<String> {
        self.state.executed.lock().await.clone()
    }

    /// Content of a file inside a sandbox.
    pub async fn file(&self, id: &SandboxId, path: &str) -> Option<Vec<u8>> {
        self.state
            .files
            .lock()
            .await
            .get(id)
            .and_then(|files| files.get(path).cloned())
    }

    /// Sandboxes created and not yet destroyed.
    pub async fn live_sandboxes(&self) -> usize {
        self.state.live.lock().await.len()
    }
}

#[async_trait]
impl SandboxEngine for MockSandbox {
    async fn create(&self, _config: &SandboxConfig) -> Result<SandboxId> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.state.fail_create {
            return Err(Error::sandbox_unavailable(message.clone()));
        }

        let id = SandboxId(format!("mock-sandbox-{}", uuid::Uuid::new_v4()));
        self.state.live.lock().await.insert(id.clone());
        self.state
            .files
            .lock()
            .await
            .insert(id.clone(), HashMap::new());
        Ok(id)
    }

    async fn connect(&self, id: &SandboxId) -> Result<Arc<dyn SandboxHandle>> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.state.fail_connect {
            return Err(Error::sandbox_unavailable(message.clone()));
        }
        if !self.state.live.lock().await.contains(id) {
            return Err(Error::sandbox_unavailable(format!(
                "Sandbox {} not found",
                id
            )));
        }
        Ok(Arc::new(MockHandle {
            id: id.clone(),
            state: self.state.clone(),
        }))
    }

    async fn destroy(&self, id: &SandboxId) -> Result<()> {
        self.state.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.state.fail_destroy {
            return Err(Error::internal(message.clone()));
        }
        self.state.live.lock().await.remove(id);
        self.state.files.lock().await.remove(id);
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Handle onto one mock sandbox.
pub struct MockHandle {
    id: SandboxId,
    state: Arc<MockState>,
}

#[async_trait]
impl SandboxHandle for MockHandle {
    fn id(&self) -> &SandboxId {
        &self.id
    }

    async fn run(
        &self,
        command: &str,
        _timeout: Duration,
        on_output: OutputSink<'_>,
    ) -> Result<ExecResult> {
        self.state.executed.lock().await.push(command.to_string());

        if let Some(ref message) = self.state.fail_exec {
            on_output(OutputStream::Stdout, "partial output\n");
            return Err(Error::tool_execution(message.clone()));
        }

        let scripted = self.state.exec_responses.lock().await.pop_front();
        let result = scripted.unwrap_or_else(|| ExecResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
        });

        if !result.stdout.is_empty() {
            on_output(OutputStream::Stdout, &result.stdout);
        }
        if !result.stderr.is_empty() {
            on_output(OutputStream::Stderr, &result.stderr);
        }
        Ok(result)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        if self.state.fail_write_paths.contains(path) {
            return Err(Error::tool_execution(format!(
                "Failed to write file '{}' in sandbox: disk full",
                path
            )));
        }
        let mut files = self.state.files.lock().await;
        let sandbox = files
            .get_mut(&self.id)
            .ok_or_else(|| Error::tool_execution(format!("Sandbox {} is gone", self.id)))?;
        sandbox.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.state
            .files
            .lock()
            .await
            .get(&self.id)
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| {
                Error::tool_execution(format!("File not found in mock sandbox: {}", path))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sandbox_lifecycle() {
        let mock = MockSandbox::new(vec![ExecResult {
            exit_code: 0,
            stdout: "Hello Sandbox World".into(),
            stderr: String::new(),
            timed_out: false,
        }]);

        let id = mock.create(&SandboxConfig::default()).await.unwrap();
        let handle = mock.connect(&id).await.unwrap();

        handle.write_file("test.txt", b"hello world").await.unwrap();
        assert_eq!(handle.read_file("test.txt").await.unwrap(), b"hello world");

        let mut streamed = String::new();
        let result = handle
            .run("echo Hello", Duration::from_secs(5), &mut |_: OutputStream, chunk: &str| {
                streamed.push_str(chunk)
            })
            .await
            .unwrap();
        assert!(result.success());
        assert_eq!(streamed, "Hello Sandbox World");

        mock.destroy(&id).await.unwrap();
        assert!(mock.connect(&id).await.is_err());
        assert_eq!(mock.live_sandboxes().await, 0);
    }

    #[tokio::test]
    async fn test_mock_sandbox_file_not_found() {
        let mock = MockSandbox::default();
        let id = mock.create(&SandboxConfig::default()).await.unwrap();
        let handle = mock.connect(&id).await.unwrap();
        assert!(handle.read_file("nonexistent.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockSandbox::default()
            .with_failing_create("quota exceeded")
            .with_failing_destroy("already stopping");
        let err = mock.create(&SandboxConfig::default()).await.unwrap_err();
        assert!(matches!(err, Error::SandboxUnavailable(_)));
        assert!(mock.destroy(&SandboxId("x".into())).await.is_err());
        assert_eq!(mock.create_calls(), 1);
        assert_eq!(mock.destroy_calls(), 1);
    }
}
