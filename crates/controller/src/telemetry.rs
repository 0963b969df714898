//! Metric helpers for the job engine.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op.

/// Count a finished job by outcome (`succeeded`, `failed`, `cancelled`).
pub fn track_job(outcome: &'static str, duration_sec: f64) {
    metrics::counter!("sandforge_jobs_total", "outcome" => outcome).increment(1);
    metrics::histogram!("sandforge_job_duration_seconds", "outcome" => outcome).record(duration_sec);
}

/// Count one scheduled round.
pub fn track_round() {
    metrics::counter!("sandforge_rounds_total").increment(1);
}

/// Count a tool call and its latency.
pub fn track_tool_call(tool: &'static str, success: bool, latency_sec: f64) {
    metrics::counter!(
        "sandforge_tool_calls_total",
        "tool" => tool,
        "success" => if success { "true" } else { "false" }
    )
    .increment(1);

    metrics::histogram!("sandforge_tool_call_duration_seconds", "tool" => tool).record(latency_sec);
}

/// Helper to track token usage.
pub fn track_tokens(prompt: u64, completion: u64) {
    metrics::counter!("sandforge_llm_tokens_total", "type" => "prompt").increment(prompt);
    metrics::counter!("sandforge_llm_tokens_total", "type" => "completion").increment(completion);
}
