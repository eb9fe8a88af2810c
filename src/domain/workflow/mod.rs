//! Workflow domain module
//!
//! A run threads a [`WorkflowContext`] through a fixed, ordered list of
//! [`WorkflowStep`]s. Each step is recorded as a [`WorkflowStepRun`] with
//! bounded input/output snapshots, which is what makes rerunning a finished
//! run from an arbitrary step possible without repeating the earlier LLM
//! calls.

mod cancellation;
mod context;
mod error;
mod llm_client;
mod options;
mod progress;
pub mod repository;
mod run;
mod status;
mod step;
mod step_run;
mod truncation;
mod views;

pub use cancellation::{cancellation_pair, CancellationHandle, CancellationSignal};
pub use context::{RedactedItem, WorkflowContext};
pub use error::{StepError, WorkflowError};
pub use llm_client::{LlmClient, TextStream};
pub use options::{Audience, Tone, WorkflowOptions};
pub use progress::{ProgressEvent, ProgressHub, ProgressReporter};
pub use repository::{RunStore, StepRunRepository, WorkflowRunRepository};
pub use run::{RunId, RunRecord, WorkflowRun};
pub use status::{RunStatus, StepStatus};
pub use step::{StepDefinition, StepScope, WorkflowStep};
pub use step_run::{StepRunId, StepRunRecord, WorkflowStepRun};
pub use truncation::{truncate, Snapshot, DEFAULT_MAX_LENGTH, TRUNCATION_MARKER};
pub use views::{RunDetails, RunPage};

#[cfg(test)]
pub use llm_client::mock::ScriptedLlmClient;
#[cfg(test)]
pub use progress::mock::{FailingProgressHub, RecordingProgressHub};
#[cfg(test)]
pub use step::mock::test_scope;
