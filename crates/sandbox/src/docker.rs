//! Docker sandbox engine.
//!
//! Creates isolated Linux containers with strict resource limits, no host
//! network access, and a read-only root filesystem, using the `bollard` crate.

use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

use sandforge_core::{Error, Result};

use crate::engine::{
    ExecResult, NetworkProfile, OutputSink, OutputStream, SandboxConfig, SandboxEngine,
    SandboxHandle, SandboxId,
};

const SANDBOX_USER: &str = "user";
const FILE_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Docker-based sandbox engine.
///
/// Creates isolated containers with:
/// - No host network access (by default)
/// - Read-only root filesystem (writable workdir only)
/// - Memory and CPU limits
/// - Non-root user execution
/// - Execution timeout enforcement
pub struct DockerSandbox {
    docker: bollard::Docker,
}

impl DockerSandbox {
    /// Create a new Docker sandbox engine connecting to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::sandbox_unavailable(format!(
                "Failed to connect to Docker daemon: {}. Is Docker running?",
                e
            ))
        })?;
        Ok(Self { docker })
    }

    /// Create from an existing bollard Docker client.
    pub fn from_client(docker: bollard::Docker) -> Self {
        Self { docker }
    }

    async fn remove(&self, id: &str) -> std::result::Result<(), bollard::errors::Error> {
        use bollard::container::RemoveContainerOptions;

        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
    }
}

#[async_trait]
impl SandboxEngine for DockerSandbox {
    async fn create(&self, config: &SandboxConfig) -> Result<SandboxId> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::{HostConfig, Mount, MountTypeEnum};

        let sandbox_id = format!("sandforge-{}", uuid::Uuid::new_v4());

        let host_config = HostConfig {
            memory: Some(config.memory_limit),
            cpu_quota: Some(config.cpu_quota),
            cpu_period: Some(100_000), // standard 100ms period
            network_mode: match &config.network_profile {
                NetworkProfile::None => Some("none".to_string()),
                NetworkProfile::Host => Some("host".to_string()),
                NetworkProfile::Bridge => Some("bridge".to_string()),
                NetworkProfile::Custom(name) => Some(name.clone()),
            },
            // Writable scratch space for generated files
            mounts: Some(vec![Mount {
                target: Some(config.workdir.clone()),
                typ: Some(MountTypeEnum::TMPFS),
                tmpfs_options: Some(bollard::models::MountTmpfsOptions {
                    size_bytes: Some(config.memory_limit / 2),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            readonly_rootfs: Some(true),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            // Prevent fork bombs and too many open files
            pids_limit: Some(256),
            ulimits: Some(vec![bollard::models::ResourcesUlimits {
                name: Some("nofile".to_string()),
                soft: Some(1024),
                hard: Some(2048),
            }]),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(config.template.clone()),
            working_dir: Some(config.workdir.clone()),
            user: Some(SANDBOX_USER.to_string()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            labels: Some(std::collections::HashMap::from([(
                "managed-by".to_string(),
                "sandforge".to_string(),
            )])),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: sandbox_id.as_str(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| {
                Error::sandbox_unavailable(format!("Failed to create sandbox container: {}", e))
            })?;

        if let Err(e) = self.docker.start_container::<String>(&sandbox_id, None).await {
            // Do not leak the half-created container.
            if let Err(cleanup) = self.remove(&sandbox_id).await {
                tracing::warn!(sandbox_id = %sandbox_id, error = %cleanup, "Failed to remove unstarted sandbox container");
            }
            return Err(Error::sandbox_unavailable(format!(
                "Failed to start sandbox container: {}",
                e
            )));
        }

        tracing::info!(sandbox_id = %sandbox_id, template = %config.template, "Sandbox container created and started");

        Ok(SandboxId(sandbox_id))
    }

    async fn connect(&self, id: &SandboxId) -> Result<Arc<dyn SandboxHandle>> {
        let inspect = self
            .docker
            .inspect_container(&id.0, None)
            .await
            .map_err(|e| Error::sandbox_unavailable(format!("Sandbox {} unreachable: {}", id, e)))?;

        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        if !running {
            return Err(Error::sandbox_unavailable(format!(
                "Sandbox {} is not running",
                id
            )));
        }

        let workdir = inspect
            .config
            .and_then(|c| c.working_dir)
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| "/home/user".to_string());

        Ok(Arc::new(DockerHandle {
            docker: self.docker.clone(),
            id: id.clone(),
            workdir,
        }))
    }

    async fn destroy(&self, id: &SandboxId) -> Result<()> {
        use bollard::container::StopContainerOptions;

        // Stop with a short grace period; removal below is forced anyway.
        if let Err(e) = self
            .docker
            .stop_container(&id.0, Some(StopContainerOptions { t: 5 }))
            .await
        {
            tracing::debug!(sandbox_id = %id, error = %e, "Sandbox stop failed; forcing removal");
        }

        match self.remove(&id.0).await {
            Ok(()) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                tracing::debug!(sandbox_id = %id, "Sandbox container already gone");
            }
            Err(e) => {
                return Err(Error::internal(format!(
                    "Failed to remove sandbox container: {}",
                    e
                )))
            }
        }

        tracing::info!(sandbox_id = %id, "Sandbox container destroyed");
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}

// =============================================================================
// Docker Handle
// =============================================================================

/// Connection to one running sandbox container.
pub struct DockerHandle {
    docker: bollard::Docker,
    id: SandboxId,
    workdir: String,
}

/// Quote a value for `sh -c`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl SandboxHandle for DockerHandle {
    fn id(&self) -> &SandboxId {
        &self.id
    }

    async fn run(
        &self,
        command: &str,
        timeout: Duration,
        on_output: OutputSink<'_>,
    ) -> Result<ExecResult> {
        use bollard::exec::{CreateExecOptions, StartExecResults};

        let exec_options = CreateExecOptions {
            cmd: Some(vec!["sh", "-c", command]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(self.workdir.as_str()),
            user: Some(SANDBOX_USER),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&self.id.0, exec_options)
            .await
            .map_err(|e| Error::tool_execution(format!("Failed to create exec in sandbox: {}", e)))?;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::tool_execution(format!("Failed to start exec in sandbox: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            use futures::StreamExt;

            let collect_future = async {
                while let Some(msg) = output.next().await {
                    match msg {
                        Ok(bollard::container::LogOutput::StdOut { message }) => {
                            let chunk = String::from_utf8_lossy(&message);
                            on_output(OutputStream::Stdout, &chunk);
                            stdout.push_str(&chunk);
                        }
                        Ok(bollard::container::LogOutput::StdErr { message }) => {
                            let chunk = String::from_utf8_lossy(&message);
                            on_output(OutputStream::Stderr, &chunk);
                            stderr.push_str(&chunk);
                        }
                        Ok(_) => {} // ignore stdin logs
                        Err(e) => {
                            return Err(Error::tool_execution(format!(
                                "Sandbox output stream failed: {}",
                                e
                            )));
                        }
                    }
                }
                Ok(())
            };

            match tokio::time::timeout(timeout, collect_future).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    tracing::warn!(sandbox = %self.id, command = %command, "Sandbox exec timed out");
                    return Ok(ExecResult {
                        exit_code: -1,
                        stdout,
                        stderr,
                        timed_out: true,
                    });
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await.map_err(|e| {
            Error::tool_execution(format!("Failed to inspect exec result: {}", e))
        })?;

        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout,
            stderr,
            timed_out: false,
        })
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let target = shell_quote(&self.absolute(path));
        let result = self
            .run_with_stdin(&write_command(&target), content, FILE_OP_TIMEOUT)
            .await?;
        if !result.success() {
            return Err(Error::tool_execution(format!(
                "Failed to write file '{}' in sandbox: {}",
                path, result.stderr
            )));
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let command = format!("base64 {}", shell_quote(&self.absolute(path)));
        let result = self.run(&command, FILE_OP_TIMEOUT, &mut |_: OutputStream, _: &str| {}).await?;

        if !result.success() {
            return Err(Error::tool_execution(format!(
                "Failed to read file '{}' in sandbox: {}",
                path, result.stderr.trim()
            )));
        }
        decode_transfer(&result.stdout)
    }
}

impl DockerHandle {
    fn absolute(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.workdir.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Run `command` with `content` streamed into its stdin.
    ///
    /// File bodies never appear in the command line, so their size is not
    /// bounded by the kernel argument limit.
    async fn run_with_stdin(
        &self,
        command: &str,
        content: &[u8],
        timeout: Duration,
    ) -> Result<ExecResult> {
        use bollard::exec::{CreateExecOptions, StartExecResults};
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;

        let exec_options = CreateExecOptions {
            cmd: Some(vec!["sh", "-c", command]),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: Some(self.workdir.as_str()),
            user: Some(SANDBOX_USER),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&self.id.0, exec_options)
            .await
            .map_err(|e| Error::tool_execution(format!("Failed to create exec in sandbox: {}", e)))?;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::tool_execution(format!("Failed to start exec in sandbox: {}", e)))?;

        let StartExecResults::Attached {
            mut output,
            mut input,
        } = start_result
        else {
            return Err(Error::tool_execution("Sandbox exec did not attach stdin"));
        };

        let mut stderr = String::new();
        let transfer = async {
            if let Err(e) = input.write_all(content).await {
                return Err(Error::tool_execution(format!(
                    "Failed to stream file into sandbox: {}",
                    e
                )));
            }
            if let Err(e) = input.shutdown().await {
                return Err(Error::tool_execution(format!(
                    "Failed to close sandbox stdin: {}",
                    e
                )));
            }
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(bollard::container::LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(Error::tool_execution(format!(
                            "Sandbox output stream failed: {}",
                            e
                        )));
                    }
                }
            }
            Ok(())
        };

        match tokio::time::timeout(timeout, transfer).await {
            Ok(transferred) => transferred?,
            Err(_) => {
                tracing::warn!(sandbox = %self.id, command = %command, "Sandbox file transfer timed out");
                return Err(Error::tool_execution(format!(
                    "Sandbox file transfer timed out after {}s",
                    timeout.as_secs()
                )));
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await.map_err(|e| {
            Error::tool_execution(format!("Failed to inspect exec result: {}", e))
        })?;

        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout: String::new(),
            stderr,
            timed_out: false,
        })
    }
}

/// Shell command that stores stdin at `target`, which must already be quoted.
fn write_command(target: &str) -> String {
    format!("mkdir -p \"$(dirname {target})\" && cat > {target}")
}

/// Decode `base64` tool output, which wraps lines.
fn decode_transfer(stdout: &str) -> Result<Vec<u8>> {
    let packed: String = stdout.split_whitespace().collect();
    base64::engine::general_purpose::STANDARD
        .decode(packed)
        .map_err(|e| Error::tool_execution(format!("Sandbox returned undecodable file data: {}", e)))
}
