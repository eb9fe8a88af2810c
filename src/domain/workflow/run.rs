//! Workflow run entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::WorkflowError;
use super::options::WorkflowOptions;
use super::status::RunStatus;
use crate::domain::DomainError;

/// Identifier of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("Invalid run ID '{}': {}", s, e)))
    }
}

/// Persisted shape of a run, used by stores to rebuild the entity
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: RunId,
    pub parent_run_id: Option<RunId>,
    pub root_run_id: RunId,
    pub status: RunStatus,
    pub options: WorkflowOptions,
    pub input_text_redacted: String,
    pub final_output_html: Option<String>,
    pub error: Option<String>,
    pub rerun_from_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<u64>,
}

/// One end-to-end execution of the pipeline.
///
/// Only the redacted input is held here; the pre-redaction text lives in the
/// in-memory [`WorkflowContext`](super::WorkflowContext) of the executing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    id: RunId,

    #[serde(skip_serializing_if = "Option::is_none")]
    parent_run_id: Option<RunId>,

    /// Equal to `id` for origin runs, inherited by every rerun
    root_run_id: RunId,

    status: RunStatus,

    options: WorkflowOptions,

    input_text_redacted: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    final_output_html: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    rerun_from_step: Option<String>,

    created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    total_duration_ms: Option<u64>,
}

impl WorkflowRun {
    /// Create a pending origin run
    pub fn new(input_text_redacted: impl Into<String>, options: WorkflowOptions) -> Self {
        let id = RunId::generate();
        Self {
            id,
            parent_run_id: None,
            root_run_id: id,
            status: RunStatus::Pending,
            options,
            input_text_redacted: input_text_redacted.into(),
            final_output_html: None,
            error: None,
            rerun_from_step: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_duration_ms: None,
        }
    }

    /// Create a pending rerun of `parent` starting at `from_step`
    pub fn rerun_of(parent: &WorkflowRun, from_step: impl Into<String>) -> Self {
        Self {
            id: RunId::generate(),
            parent_run_id: Some(parent.id),
            root_run_id: parent.root_run_id,
            status: RunStatus::Pending,
            options: parent.options,
            input_text_redacted: parent.input_text_redacted.clone(),
            final_output_html: None,
            error: None,
            rerun_from_step: Some(from_step.into()),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_duration_ms: None,
        }
    }

    pub fn from_record(record: RunRecord) -> Self {
        Self {
            id: record.id,
            parent_run_id: record.parent_run_id,
            root_run_id: record.root_run_id,
            status: record.status,
            options: record.options,
            input_text_redacted: record.input_text_redacted,
            final_output_html: record.final_output_html,
            error: record.error,
            rerun_from_step: record.rerun_from_step,
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            total_duration_ms: record.total_duration_ms,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn parent_run_id(&self) -> Option<RunId> {
        self.parent_run_id
    }

    pub fn root_run_id(&self) -> RunId {
        self.root_run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn options(&self) -> WorkflowOptions {
        self.options
    }

    pub fn input_text_redacted(&self) -> &str {
        &self.input_text_redacted
    }

    pub fn final_output_html(&self) -> Option<&str> {
        self.final_output_html.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn rerun_from_step(&self) -> Option<&str> {
        self.rerun_from_step.as_deref()
    }

    pub fn is_rerun(&self) -> bool {
        self.parent_run_id.is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn total_duration_ms(&self) -> Option<u64> {
        self.total_duration_ms
    }

    /// Milliseconds since the run started, if it has
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.started_at
            .map(|started| (Utc::now() - started).num_milliseconds().max(0) as u64)
    }

    fn transition(&mut self, target: RunStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(target) {
            return Err(WorkflowError::invalid_transition("run", self.status, target));
        }

        self.status = target;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(
        &mut self,
        final_output_html: Option<String>,
        duration_ms: u64,
    ) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Completed)?;
        self.final_output_html = final_output_html;
        self.finish(duration_ms);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Failed)?;
        self.error = Some(error.into());
        self.finish(duration_ms);
        Ok(())
    }

    pub fn mark_canceled(&mut self, duration_ms: Option<u64>) -> Result<(), WorkflowError> {
        self.transition(RunStatus::Canceled)?;
        self.completed_at = Some(Utc::now());
        self.total_duration_ms = duration_ms;
        Ok(())
    }

    fn finish(&mut self, duration_ms: u64) {
        self.completed_at = Some(Utc::now());
        self.total_duration_ms = Some(duration_ms);
    }
}
