//! One-way progress notifications keyed by run

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::run::RunId;
use crate::domain::DomainError;

/// Progress event published while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StepStarted {
        run_id: RunId,
        step_name: String,
    },
    StepCompleted {
        run_id: RunId,
        step_name: String,
        duration_ms: u64,
    },
    StepFailed {
        run_id: RunId,
        step_name: String,
        error: String,
    },
    RunCompleted {
        run_id: RunId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    StepStatus {
        run_id: RunId,
        step_name: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },
    LlmStream {
        run_id: RunId,
        step_name: String,
        partial_text: String,
    },
}

impl ProgressEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            Self::StepStarted { run_id, .. }
            | Self::StepCompleted { run_id, .. }
            | Self::StepFailed { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::StepStatus { run_id, .. }
            | Self::LlmStream { run_id, .. } => *run_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::StepCompleted { .. } => "step_completed",
            Self::StepFailed { .. } => "step_failed",
            Self::RunCompleted { .. } => "run_completed",
            Self::StepStatus { .. } => "step_status",
            Self::LlmStream { .. } => "llm_stream",
        }
    }
}

/// Delivery endpoint for progress events (websocket fan-out, logs, ...)
#[async_trait]
pub trait ProgressHub: Send + Sync + Debug {
    async fn publish(&self, event: ProgressEvent) -> Result<(), DomainError>;
}

/// Fire-and-forget publisher bound to one run. Delivery failures are logged
/// and never reach the caller.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    hub: Arc<dyn ProgressHub>,
    run_id: RunId,
}

impl ProgressReporter {
    pub fn new(hub: Arc<dyn ProgressHub>, run_id: RunId) -> Self {
        Self { hub, run_id }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub async fn step_started(&self, step_name: &str) {
        self.emit(ProgressEvent::StepStarted {
            run_id: self.run_id,
            step_name: step_name.to_string(),
        })
        .await
    }

    pub async fn step_completed(&self, step_name: &str, duration_ms: u64) {
        self.emit(ProgressEvent::StepCompleted {
            run_id: self.run_id,
            step_name: step_name.to_string(),
            duration_ms,
        })
        .await
    }

    pub async fn step_failed(&self, step_name: &str, error: &str) {
        self.emit(ProgressEvent::StepFailed {
            run_id: self.run_id,
            step_name: step_name.to_string(),
            error: error.to_string(),
        })
        .await
    }

    pub async fn run_completed(&self, success: bool, error: Option<&str>) {
        self.emit(ProgressEvent::RunCompleted {
            run_id: self.run_id,
            success,
            error: error.map(str::to_string),
        })
        .await
    }

    pub async fn step_status(&self, step_name: &str, message: &str, percent: Option<u8>) {
        self.emit(ProgressEvent::StepStatus {
            run_id: self.run_id,
            step_name: step_name.to_string(),
            message: message.to_string(),
            percent: percent.map(|p| p.min(100)),
        })
        .await
    }

    pub async fn llm_stream(&self, step_name: &str, partial_text: &str) {
        self.emit(ProgressEvent::LlmStream {
            run_id: self.run_id,
            step_name: step_name.to_string(),
            partial_text: partial_text.to_string(),
        })
        .await
    }

    async fn emit(&self, event: ProgressEvent) {
        let kind = event.kind();
        if let Err(e) = self.hub.publish(event).await {
            warn!(run_id = %self.run_id, event = kind, error = %e, "Progress notification dropped");
        }
    }
}
