//! Domain layer - entities, collaborator contracts and errors

pub mod compliance;
pub mod error;
pub mod llm;
pub mod samples;
pub mod workflow;

pub use error::DomainError;
pub use llm::{
    FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, LlmStream, Message,
    MessageRole, ResponseFormat, StreamChunk, Usage,
};
pub use workflow::{
    RunId, RunStatus, StepStatus, WorkflowContext, WorkflowError, WorkflowOptions, WorkflowRun,
    WorkflowStepRun,
};
