//! Infrastructure layer - collaborator implementations, storage and wiring

pub mod compliance;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod progress;
pub mod storage;
pub mod workflow;
