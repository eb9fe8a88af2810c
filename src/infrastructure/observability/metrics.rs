//! Workflow metrics
//!
//! Everything goes through the `metrics` facade. No recorder is installed by
//! the crate, so these calls are no-ops until the embedding application
//! installs one.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::domain::workflow::{RunStatus, StepStatus};

/// Publish a constant gauge carrying the crate version
pub fn register_build_info() {
    gauge!("policy_pack_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a finished step execution
pub fn record_step(step: &str, status: StepStatus, duration: Duration) {
    let labels = [
        ("step", step.to_string()),
        ("status", status.as_str().to_string()),
    ];

    counter!("workflow_steps_total", &labels).increment(1);
    histogram!("workflow_step_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a run reaching a terminal status
pub fn record_run(status: RunStatus, is_rerun: bool, duration: Duration) {
    let labels = [
        ("status", status.as_str().to_string()),
        ("kind", if is_rerun { "rerun" } else { "origin" }.to_string()),
    ];

    counter!("workflow_runs_total", &labels).increment(1);
    histogram!("workflow_run_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record an LLM request metric
pub fn record_llm_request(params: LlmRequestMetricParams) {
    let labels = [
        ("provider", params.provider.to_string()),
        ("model", params.model.to_string()),
        ("mode", params.mode.to_string()),
        ("status", if params.success { "success" } else { "error" }.to_string()),
    ];

    counter!("llm_requests_total", &labels).increment(1);
    histogram!("llm_request_duration_seconds", &labels).record(params.duration.as_secs_f64());

    if let Some(tokens) = params.input_tokens {
        counter!("llm_input_tokens_total", &labels).increment(tokens);
    }

    if let Some(tokens) = params.output_tokens {
        counter!("llm_output_tokens_total", &labels).increment(tokens);
    }

    if !params.success {
        counter!("llm_errors_total", &labels).increment(1);
    }
}

/// Parameters for LLM request metrics
pub struct LlmRequestMetricParams<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    /// `text`, `json` or `stream`
    pub mode: &'a str,
    pub duration: Duration,
    pub success: bool,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        register_build_info();
        record_step("summarize", StepStatus::Completed, Duration::from_millis(12));
        record_run(RunStatus::Failed, true, Duration::from_secs(1));
        record_llm_request(LlmRequestMetricParams {
            provider: "azure_openai",
            model: "gpt-4o",
            mode: "json",
            duration: Duration::from_millis(300),
            success: true,
            input_tokens: Some(10),
            output_tokens: None,
        });
    }
}
