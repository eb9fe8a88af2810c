//! Persistence contracts for runs and their step runs

use async_trait::async_trait;

use super::run::{RunId, WorkflowRun};
use super::step_run::WorkflowStepRun;
use crate::domain::DomainError;

/// Repository trait for workflow runs
#[async_trait]
pub trait WorkflowRunRepository: Send + Sync + std::fmt::Debug {
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError>;

    /// Fails with `Conflict` once the stored run is completed, failed or
    /// canceled
    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, DomainError>;

    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError>;

    /// Delete a run together with its step runs
    async fn delete(&self, id: &RunId) -> Result<bool, DomainError>;

    /// Page of runs, newest first
    async fn list(&self, skip: usize, take: usize) -> Result<Vec<WorkflowRun>, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;

    /// Direct reruns of `parent`, oldest first
    async fn children(&self, parent: &RunId) -> Result<Vec<WorkflowRun>, DomainError>;

    /// Every run sharing `root`, the root included, oldest first
    async fn lineage(&self, root: &RunId) -> Result<Vec<WorkflowRun>, DomainError>;
}

/// Repository trait for step runs
#[async_trait]
pub trait StepRunRepository: Send + Sync + std::fmt::Debug {
    /// Fails with `Conflict` when `(run_id, step_name)` already exists
    async fn create_step(&self, step: WorkflowStepRun) -> Result<WorkflowStepRun, DomainError>;

    async fn update_step(&self, step: &WorkflowStepRun) -> Result<WorkflowStepRun, DomainError>;

    /// Steps of a run ordered by step order
    async fn list_for_run(&self, run_id: &RunId) -> Result<Vec<WorkflowStepRun>, DomainError>;

    async fn get_by_name(
        &self,
        run_id: &RunId,
        step_name: &str,
    ) -> Result<Option<WorkflowStepRun>, DomainError>;
}

/// Both repositories behind one handle, as every store backend provides them
pub trait RunStore: WorkflowRunRepository + StepRunRepository {}

impl<T: WorkflowRunRepository + StepRunRepository> RunStore for T {}
