#![deny(unused)]
//! Job controller for Sandforge.
//!
//! This crate drives a prompt through the agent network: the job engine
//! provisions a sandbox, the router and coding agent iterate in bounded
//! rounds, and the result aggregator tears the sandbox down and reports the
//! generated files. Every side-effecting step goes through the step log so a
//! re-invoked job replays instead of repeating work.

pub mod agent;
pub mod aggregator;
pub mod builder;
pub mod engine;
pub mod llm;
pub mod network;
pub mod parser;
pub mod persistence;
pub mod router;
pub mod steps;
pub mod telemetry;

pub use agent::{Agent, AgentContext, CodingAgent};
pub use aggregator::{Finalized, ResultAggregator, CANCELLED};
pub use builder::JobEngineBuilder;
pub use engine::JobEngine;
pub use llm::OpenAiCompatClient;
pub use network::{AgentNetwork, NetworkOutcome, NetworkStatus, StopReason};
pub use parser::ResponseParser;
pub use persistence::InMemoryStepLog;
pub use router::{DefaultRouter, RouteDecision, Router, CODING_AGENT};
pub use steps::StepRunner;
pub use tokio_util::sync::CancellationToken;
