#![deny(unused)]
//! Sandforge - prompt to code in a disposable sandbox.
//!
//! Runs one job from the command line: provision a Docker sandbox, let the
//! coding agent iterate against an OpenAI-compatible model, then print the
//! generated files and their tree as JSON.

mod telemetry;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use sandforge_controller::{CancellationToken, JobEngine, OpenAiCompatClient};
use sandforge_core::{build_tree, config::AppConfig, Job, JobSubmission};
use sandforge_sandbox::{DockerSandbox, SandboxConfig, SandboxEngine};

#[derive(Parser)]
#[command(name = "sandforge", version, about = "Generate a project from a prompt inside a sandbox")]
struct Cli {
    /// Configuration file layered over config/default and config/local.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one job and print its result.
    Run {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "default")]
        project: String,
    },
    /// Check that the sandbox backend is reachable.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    telemetry::configure_tracing(&config.telemetry)?;

    tracing::info!("Starting Sandforge v{}", env!("CARGO_PKG_VERSION"));

    let docker = Arc::new(DockerSandbox::new()?);

    match cli.command {
        Command::Check => {
            if docker.is_available().await {
                println!("sandbox backend: available");
                Ok(())
            } else {
                anyhow::bail!("sandbox backend: Docker daemon not reachable")
            }
        }
        Command::Run { prompt, project } => {
            let mut job = Job::submit(JobSubmission::new(prompt, project))?;

            let llm = Arc::new(OpenAiCompatClient::new(&config.model)?);
            tracing::info!(model = llm.model(), "Model client initialized");

            let engine = JobEngine::builder()
                .with_sandbox_config(SandboxConfig::from_settings(
                    &config.engine.template_id,
                    &config.sandbox,
                ))
                .with_config(config.engine.clone())
                .with_sandbox_engine(docker)
                .with_llm(llm)
                .build()?;

            // Ctrl-C stops scheduling rounds; the sandbox is still torn down.
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing the current round");
                    on_signal.cancel();
                }
            });

            let result = engine.run_with_cancel(&mut job, &cancel).await;
            let output = serde_json::json!({
                "job_id": job.id,
                "status": job.status,
                "result": result,
                "tree": build_tree(&result.files),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);

            if !result.success {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
