//! Per-step execution record owned by a run

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::WorkflowError;
use super::run::RunId;
use super::status::StepStatus;
use super::truncation::Snapshot;
use crate::domain::DomainError;

/// Identifier of a step run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepRunId(Uuid);

impl StepRunId {
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

impl fmt::Display for StepRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StepRunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("Invalid step run ID '{}': {}", s, e)))
    }
}

/// Persisted shape of a step run
#[derive(Debug, Clone)]
pub struct StepRunRecord {
    pub id: StepRunId,
    pub run_id: RunId,
    pub step_name: String,
    pub step_order: u32,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub input_snapshot: Option<Snapshot>,
    pub output_snapshot: Option<Snapshot>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

/// Execution record of one step within one run. `(run_id, step_name)` is
/// unique and `step_order` gives the execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepRun {
    id: StepRunId,
    run_id: RunId,
    step_name: String,
    /// 1-based position in the pipeline
    step_order: u32,
    status: StepStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    input_snapshot: Option<Snapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    output_snapshot: Option<Snapshot>,

    #[serde(default)]
    warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WorkflowStepRun {
    pub fn pending(run_id: RunId, step_name: impl Into<String>, step_order: u32) -> Self {
        Self {
            id: StepRunId::generate(),
            run_id,
            step_name: step_name.into(),
            step_order,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            input_snapshot: None,
            output_snapshot: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Skipped step of a rerun, carrying the parent's snapshots and warnings
    /// verbatim
    pub fn skipped_from(run_id: RunId, parent: &WorkflowStepRun) -> Self {
        Self {
            id: StepRunId::generate(),
            run_id,
            step_name: parent.step_name.clone(),
            step_order: parent.step_order,
            status: StepStatus::Skipped,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            input_snapshot: parent.input_snapshot.clone(),
            output_snapshot: parent.output_snapshot.clone(),
            warnings: parent.warnings.clone(),
            error: None,
        }
    }

    pub fn from_record(record: StepRunRecord) -> Self {
        Self {
            id: record.id,
            run_id: record.run_id,
            step_name: record.step_name,
            step_order: record.step_order,
            status: record.status,
            started_at: record.started_at,
            completed_at: record.completed_at,
            duration_ms: record.duration_ms,
            input_snapshot: record.input_snapshot,
            output_snapshot: record.output_snapshot,
            warnings: record.warnings,
            error: record.error,
        }
    }

    pub fn id(&self) -> StepRunId {
        self.id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn step_order(&self) -> u32 {
        self.step_order
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn input_snapshot(&self) -> Option<&Snapshot> {
        self.input_snapshot.as_ref()
    }

    pub fn output_snapshot(&self) -> Option<&Snapshot> {
        self.output_snapshot.as_ref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn transition(&mut self, target: StepStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(target) {
            return Err(WorkflowError::invalid_transition("step", self.status, target));
        }

        self.status = target;
        Ok(())
    }

    pub fn mark_running(&mut self, input_snapshot: Snapshot) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Running)?;
        self.started_at = Some(Utc::now());
        self.input_snapshot = Some(input_snapshot);
        Ok(())
    }

    pub fn mark_completed(
        &mut self,
        output_snapshot: Snapshot,
        warnings: Vec<String>,
        duration_ms: u64,
    ) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Completed)?;
        self.output_snapshot = Some(output_snapshot);
        self.warnings = warnings;
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Result<(), WorkflowError> {
        self.transition(StepStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
        Ok(())
    }
}
