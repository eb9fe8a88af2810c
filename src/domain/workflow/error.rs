//! Workflow error types

use thiserror::Error;

use crate::domain::DomainError;

/// Errors surfaced by the orchestrator's public operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Cannot rerun '{run_id}' from step '{step}': {reason}")]
    InvalidRerun {
        run_id: String,
        step: String,
        reason: String,
    },

    #[error("Invalid {entity} status transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Run cannot be canceled: {0}")]
    CannotCancel(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl WorkflowError {
    pub fn run_not_found(id: impl Into<String>) -> Self {
        Self::RunNotFound(id.into())
    }

    pub fn unknown_step(name: impl Into<String>) -> Self {
        Self::UnknownStep(name.into())
    }

    pub fn invalid_rerun(
        run_id: impl Into<String>,
        step: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRerun {
            run_id: run_id.into(),
            step: step.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn cannot_cancel(message: impl Into<String>) -> Self {
        Self::CannotCancel(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<DomainError> for WorkflowError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { message } => Self::RunNotFound(message),
            DomainError::Validation { message } => Self::Validation(message),
            DomainError::Configuration { message } => Self::Configuration(message),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Typed failure of a single step execution
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    #[error("LLM call failed: {0}")]
    Llm(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Step was cancelled")]
    Cancelled,
}

impl StepError {
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson(message.into())
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }
}

/// LLM client failures as step failures. A malformed answer is a JSON
/// failure and a fired signal is a cancellation; anything else is an LLM
/// failure.
impl From<DomainError> for StepError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidResponse { message, .. } => Self::InvalidJson(message),
            DomainError::Cancelled => Self::Cancelled,
            other => Self::Llm(other.to_string()),
        }
    }
}
