//! Read models returned by the orchestrator

use serde::Serialize;

use super::run::WorkflowRun;
use super::status::StepStatus;
use super::step_run::WorkflowStepRun;

/// A run with its step runs in execution order
#[derive(Debug, Clone, Serialize)]
pub struct RunDetails {
    pub run: WorkflowRun,
    pub steps: Vec<WorkflowStepRun>,
}

impl RunDetails {
    pub fn step(&self, name: &str) -> Option<&WorkflowStepRun> {
        self.steps.iter().find(|s| s.step_name() == name)
    }

    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(WorkflowStepRun::status)
    }

    pub fn count_with_status(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status() == status).count()
    }
}

/// One page of runs, newest first
#[derive(Debug, Clone, Serialize)]
pub struct RunPage {
    pub runs: Vec<WorkflowRun>,
    pub total: usize,
    pub skip: usize,
    pub take: usize,
}
