//! Sandbox integration tests.
//!
//! Tests the full pipeline: ToolCall → ToolRegistry → SandboxManager →
//! SandboxEngine (MockSandbox). No Docker required.

use std::sync::Arc;
use std::time::Duration;

use sandforge_core::{FileCollection, FileEntry, ToolCall, ToolInvocationResult};
use sandforge_sandbox::{
    ExecResult, MockSandbox, SandboxConfig, SandboxId, SandboxManager, TeardownOutcome,
    ToolContext, ToolRegistry,
};

// =============================================================================
// Helpers
// =============================================================================

async fn provision(mock: &MockSandbox) -> (SandboxManager, SandboxId) {
    let manager = SandboxManager::new(Arc::new(mock.clone()), SandboxConfig::default());
    let id = manager.create("sandforge-nextjs:latest").await.unwrap();
    (manager, id)
}

async fn invoke(
    manager: &SandboxManager,
    id: &SandboxId,
    files: &FileCollection,
    call: ToolCall,
) -> ToolInvocationResult {
    let ctx = ToolContext {
        manager,
        sandbox_id: id,
        files,
        command_timeout: Duration::from_secs(30),
    };
    ToolRegistry::with_defaults().invoke(&ctx, &call).await.unwrap()
}

// =============================================================================
// 1. Command execution
// =============================================================================

#[tokio::test]
async fn test_command_success() {
    let mock = MockSandbox::new(vec![ExecResult {
        exit_code: 0,
        stdout: "added 312 packages\n".into(),
        stderr: String::new(),
        timed_out: false,
    }]);
    let (manager, id) = provision(&mock).await;

    let result = invoke(
        &manager,
        &id,
        &FileCollection::new(),
        ToolCall::RunCommand {
            command: "npm install".into(),
        },
    )
    .await;

    let ToolInvocationResult::Command(result) = result else {
        panic!("expected command result");
    };
    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "added 312 packages\n");
    assert_eq!(mock.executed_commands().await, vec!["npm install"]);
}

#[tokio::test]
async fn test_command_timeout() {
    let mock = MockSandbox::new(vec![ExecResult {
        exit_code: -1,
        stdout: "partial output...".into(),
        stderr: String::new(),
        timed_out: true,
    }]);
    let (manager, id) = provision(&mock).await;

    let result = invoke(
        &manager,
        &id,
        &FileCollection::new(),
        ToolCall::RunCommand {
            command: "npm run dev".into(),
        },
    )
    .await;

    let ToolInvocationResult::Command(result) = result else {
        panic!("expected command result");
    };
    assert!(!result.success, "Timed-out command should report failure");
    assert_eq!(result.stdout, "partial output...");
    assert!(result.error.unwrap().contains("timed out"));
}

// =============================================================================
// 2. Write then read
// =============================================================================

#[tokio::test]
async fn test_write_then_read_pipeline() {
    let mock = MockSandbox::default();
    let (manager, id) = provision(&mock).await;

    let page = "export default function Page() { return <main /> }";
    let written = invoke(
        &manager,
        &id,
        &FileCollection::new(),
        ToolCall::WriteFiles {
            files: vec![
                FileEntry::new("app/page.tsx", page),
                FileEntry::new("README.md", "# demo"),
            ],
        },
    )
    .await;
    assert!(written.success());
    let files = written.updated_files().unwrap().clone();
    assert_eq!(files.get("app/page.tsx"), Some(page));

    let read = invoke(
        &manager,
        &id,
        &files,
        ToolCall::ReadFiles {
            paths: vec!["app/page.tsx".into(), "nonexistent.txt".into()],
        },
    )
    .await;
    let ToolInvocationResult::Read(read) = read else {
        panic!("expected read result");
    };
    assert!(read.success);
    assert_eq!(read.contents["app/page.tsx"], page);
    assert!(read.contents["nonexistent.txt"].starts_with("Error: "));
}

// =============================================================================
// 3. Sandbox lifecycle
// =============================================================================

#[tokio::test]
async fn test_sandbox_lifecycle() {
    let mock = MockSandbox::default();
    let (manager, id) = provision(&mock).await;
    assert!(manager.is_available().await);
    assert_eq!(mock.live_sandboxes().await, 1);

    assert_eq!(manager.destroy(&id).await, TeardownOutcome::Destroyed);
    assert_eq!(manager.destroy(&id).await, TeardownOutcome::AlreadyDestroyed);
    assert_eq!(mock.live_sandboxes().await, 0);
    assert_eq!(mock.destroy_calls(), 1);

    // Tools against a torn-down sandbox report failure as data.
    let result = invoke(
        &manager,
        &id,
        &FileCollection::new(),
        ToolCall::RunCommand {
            command: "ls".into(),
        },
    )
    .await;
    assert!(!result.success());
}
