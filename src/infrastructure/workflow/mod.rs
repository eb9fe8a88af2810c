//! Concrete pipeline, its steps and the orchestrator driving them

mod orchestrator;
mod pipeline;
pub mod steps;

pub use orchestrator::WorkflowOrchestrator;
pub use pipeline::Pipeline;
