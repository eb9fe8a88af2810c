use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::workflow::{ProgressEvent, ProgressHub};
use crate::domain::DomainError;

/// Writes each progress event to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressHub;

#[async_trait]
impl ProgressHub for LoggingProgressHub {
    async fn publish(&self, event: ProgressEvent) -> Result<(), DomainError> {
        match &event {
            ProgressEvent::StepStarted { run_id, step_name } => {
                info!(run_id = %run_id, step = %step_name, "Step started");
            }
            ProgressEvent::StepCompleted {
                run_id,
                step_name,
                duration_ms,
            } => {
                info!(run_id = %run_id, step = %step_name, duration_ms, "Step completed");
            }
            ProgressEvent::StepFailed {
                run_id,
                step_name,
                error,
            } => {
                warn!(run_id = %run_id, step = %step_name, error = %error, "Step failed");
            }
            ProgressEvent::RunCompleted {
                run_id,
                success,
                error,
            } => {
                info!(run_id = %run_id, success, error = ?error, "Run finished");
            }
            ProgressEvent::StepStatus {
                run_id,
                step_name,
                message,
                percent,
            } => {
                debug!(run_id = %run_id, step = %step_name, percent = ?percent, "{}", message);
            }
            ProgressEvent::LlmStream { .. } => {}
        }

        Ok(())
    }
}
