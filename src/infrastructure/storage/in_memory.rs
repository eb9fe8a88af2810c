//! In-memory run store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::workflow::{
    RunId, StepRunRepository, WorkflowRun, WorkflowRunRepository, WorkflowStepRun,
};
use crate::domain::DomainError;

/// Runs and step runs kept in process memory.
///
/// Useful for the CLI and for tests. Data is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<RunId, WorkflowRun>>>,
    steps: Arc<RwLock<HashMap<RunId, Vec<WorkflowStepRun>>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(runs: &mut [WorkflowRun]) {
        runs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    }

    fn oldest_first(runs: &mut [WorkflowRun]) {
        runs.sort_by_key(WorkflowRun::created_at);
    }
}

#[async_trait]
impl WorkflowRunRepository for InMemoryRunStore {
    async fn create(&self, run: WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let mut runs = self.runs.write().await;

        if runs.contains_key(&run.id()) {
            return Err(DomainError::conflict(format!(
                "Run '{}' already exists",
                run.id()
            )));
        }

        runs.insert(run.id(), run.clone());
        Ok(run)
    }

    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, DomainError> {
        let mut runs = self.runs.write().await;

        match runs.get_mut(&run.id()) {
            Some(existing) if existing.status().is_terminal() => Err(DomainError::conflict(
                format!("Run '{}' is already {}", run.id(), existing.status()),
            )),
            Some(existing) => {
                *existing = run.clone();
                Ok(run.clone())
            }
            None => Err(DomainError::not_found(format!(
                "Run '{}' not found",
                run.id()
            ))),
        }
    }

    async fn get(&self, id: &RunId) -> Result<Option<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;
        Ok(runs.get(id).cloned())
    }

    async fn delete(&self, id: &RunId) -> Result<bool, DomainError> {
        let mut runs = self.runs.write().await;
        let mut steps = self.steps.write().await;

        steps.remove(id);
        Ok(runs.remove(id).is_some())
    }

    async fn list(&self, skip: usize, take: usize) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;

        let mut all: Vec<WorkflowRun> = runs.values().cloned().collect();
        Self::newest_first(&mut all);

        Ok(all.into_iter().skip(skip).take(take).collect())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.runs.read().await.len())
    }

    async fn children(&self, parent: &RunId) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;

        let mut children: Vec<WorkflowRun> = runs
            .values()
            .filter(|r| r.parent_run_id() == Some(*parent))
            .cloned()
            .collect();
        Self::oldest_first(&mut children);

        Ok(children)
    }

    async fn lineage(&self, root: &RunId) -> Result<Vec<WorkflowRun>, DomainError> {
        let runs = self.runs.read().await;

        let mut lineage: Vec<WorkflowRun> = runs
            .values()
            .filter(|r| r.root_run_id() == *root)
            .cloned()
            .collect();
        Self::oldest_first(&mut lineage);

        Ok(lineage)
    }
}

#[async_trait]
impl StepRunRepository for InMemoryRunStore {
    async fn create_step(&self, step: WorkflowStepRun) -> Result<WorkflowStepRun, DomainError> {
        let runs = self.runs.read().await;
        if !runs.contains_key(&step.run_id()) {
            return Err(DomainError::not_found(format!(
                "Run '{}' not found",
                step.run_id()
            )));
        }

        let mut steps = self.steps.write().await;
        let run_steps = steps.entry(step.run_id()).or_default();

        if run_steps.iter().any(|s| s.step_name() == step.step_name()) {
            return Err(DomainError::conflict(format!(
                "Step '{}' already exists for run '{}'",
                step.step_name(),
                step.run_id()
            )));
        }

        run_steps.push(step.clone());
        run_steps.sort_by_key(WorkflowStepRun::step_order);

        Ok(step)
    }

    async fn update_step(&self, step: &WorkflowStepRun) -> Result<WorkflowStepRun, DomainError> {
        let mut steps = self.steps.write().await;

        let existing = steps
            .get_mut(&step.run_id())
            .and_then(|run_steps| run_steps.iter_mut().find(|s| s.id() == step.id()))
            .ok_or_else(|| {
                DomainError::not_found(format!("Step run '{}' not found", step.id()))
            })?;

        *existing = step.clone();
        Ok(step.clone())
    }

    async fn list_for_run(&self, run_id: &RunId) -> Result<Vec<WorkflowStepRun>, DomainError> {
        let steps = self.steps.read().await;
        Ok(steps.get(run_id).cloned().unwrap_or_default())
    }

    async fn get_by_name(
        &self,
        run_id: &RunId,
        step_name: &str,
    ) -> Result<Option<WorkflowStepRun>, DomainError> {
        let steps = self.steps.read().await;

        Ok(steps
            .get(run_id)
            .and_then(|run_steps| run_steps.iter().find(|s| s.step_name() == step_name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::repository::tests as contract;
    use crate::domain::workflow::WorkflowOptions;

    #[tokio::test]
    async fn test_run_crud() {
        contract::test_run_crud(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_update_missing_run() {
        contract::test_update_missing_run(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_finished_run_is_not_overwritten() {
        contract::test_finished_run_is_not_overwritten(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_lineage_queries() {
        contract::test_lineage_queries(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        contract::test_list_newest_first(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_step_runs() {
        contract::test_step_runs(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_step_requires_run() {
        contract::test_step_requires_run(&InMemoryRunStore::new()).await;
    }

    #[tokio::test]
    async fn test_duplicate_run_is_conflict() {
        let store = InMemoryRunStore::new();
        let run = WorkflowRun::new("x", WorkflowOptions::default());

        store.create(run.clone()).await.unwrap();
        let result = store.create(run).await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryRunStore::new();
        let other = store.clone();

        store
            .create(WorkflowRun::new("x", WorkflowOptions::default()))
            .await
            .unwrap();

        assert_eq!(other.count().await.unwrap(), 1);
    }
}
