//! Step capability shared by every pipeline stage

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;

use super::cancellation::CancellationSignal;
use super::context::WorkflowContext;
use super::error::StepError;
use super::progress::ProgressReporter;

/// Static metadata of a step, as listed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub name: &'static str,
    pub order: u32,
    pub description: &'static str,
    pub uses_llm: bool,
}

/// What a step may touch besides the context: the run's cancellation signal
/// and a progress reporter
#[derive(Debug, Clone)]
pub struct StepScope {
    step_name: &'static str,
    cancel: CancellationSignal,
    reporter: ProgressReporter,
}

impl StepScope {
    pub fn new(
        step_name: &'static str,
        cancel: CancellationSignal,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            step_name,
            cancel,
            reporter,
        }
    }

    pub fn step_name(&self) -> &'static str {
        self.step_name
    }

    pub fn cancel(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub fn ensure_not_cancelled(&self) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    pub async fn status(&self, message: &str, percent: Option<u8>) {
        self.reporter
            .step_status(self.step_name, message, percent)
            .await
    }

    pub async fn stream_token(&self, partial_text: &str) {
        self.reporter.llm_stream(self.step_name, partial_text).await
    }
}

/// One named, ordered unit of pipeline work
#[async_trait]
pub trait WorkflowStep: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// 1-based position in the pipeline
    fn order(&self) -> u32;

    fn description(&self) -> &'static str;

    fn uses_llm(&self) -> bool;

    fn definition(&self) -> StepDefinition {
        StepDefinition {
            name: self.name(),
            order: self.order(),
            description: self.description(),
            uses_llm: self.uses_llm(),
        }
    }

    /// Read and mutate the context. Warnings are appended to
    /// `ctx.warnings`.
    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope)
        -> Result<(), StepError>;
}
