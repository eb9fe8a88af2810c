//! Run and step lifecycle states

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

/// Status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is created but execution has not started
    #[default]
    Pending,

    /// Steps are executing
    Running,

    /// Every step completed
    Completed,

    /// A step failed and the run halted
    Failed,

    /// Run was canceled at a step boundary
    Canceled,
}

impl RunStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        match (self, target) {
            (Self::Pending, Self::Running) => true,
            (Self::Pending, Self::Canceled) => true,

            (Self::Running, Self::Completed) => true,
            (Self::Running, Self::Failed) => true,
            (Self::Running, Self::Canceled) => true,

            // Terminal states never resurrect
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(WorkflowError::validation(format!(
                "Unknown run status '{}'",
                other
            ))),
        }
    }
}

/// Status of a single step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not reached yet, or never reached because an earlier step failed
    #[default]
    Pending,

    Running,

    Completed,

    Failed,

    /// Output replayed from the parent run of a rerun
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether the step holds a usable output snapshot
    pub fn has_output(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(WorkflowError::validation(format!(
                "Unknown step status '{}'",
                other
            ))),
        }
    }
}
